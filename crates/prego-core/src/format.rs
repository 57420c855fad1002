//! Output Formatter: contract for turning items into lines
use crate::data_model::OutputItem;
use crate::error::Result;

pub trait OutputFormatter: Send {
    /// Printed once, before the first item.
    fn preamble(&self) -> Option<String> {
        None
    }

    /// Renders one item as a single line, without the trailing newline.
    fn print(&self, item: &OutputItem) -> Result<String>;

    /// Printed once, after the last item.
    fn epilogue(&self) -> Option<String> {
        None
    }
}

impl<T: OutputFormatter + ?Sized> OutputFormatter for Box<T> {
    fn preamble(&self) -> Option<String> {
        (**self).preamble()
    }

    fn print(&self, item: &OutputItem) -> Result<String> {
        (**self).print(item)
    }

    fn epilogue(&self) -> Option<String> {
        (**self).epilogue()
    }
}
