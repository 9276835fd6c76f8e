pub mod tui;
pub mod widgets;

pub use widgets::StatefulList;
