use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::ListState;

pub struct StatefulList<T> {
    pub state: ListState,
    pub items: Vec<T>,
}

impl<T> StatefulList<T> {
    pub fn with_items(items: Vec<T>) -> StatefulList<T> {
        let mut state = ListState::default();
        // Start with the first item selected
        if !items.is_empty() {
            state.select(Some(0));
        }
        StatefulList {
            state,
            items,
        }
    }

    /// Swap in fresh items, keeping the selection index where it still fits.
    pub fn replace_items(&mut self, items: Vec<T>) {
        let selected = self.state.selected();
        self.items = items;
        let i = match selected {
            _ if self.items.is_empty() => None,
            Some(i) => Some(i.min(self.items.len() - 1)),
            None => Some(0),
        };
        self.state.select(i);
    }

    pub fn selected(&self) -> Option<&T> {
        self.state.selected().and_then(|i| self.items.get(i))
    }

    pub fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= self.items.len() - 1 {
                    i
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    i
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }
}

/// What a key did to a text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Edited,
    Submit,
    Cancel,
    Ignored,
}

/// Line editing shared by the post form, the edit box and the comment form.
/// `Alt+Enter` inserts a newline when `multiline` is set.
pub fn apply_text_key(buffer: &mut String, key: KeyEvent, multiline: bool) -> InputOutcome {
    match key.code {
        KeyCode::Enter if multiline && key.modifiers.contains(KeyModifiers::ALT) => {
            buffer.push('\n');
            InputOutcome::Edited
        }
        KeyCode::Enter => InputOutcome::Submit,
        KeyCode::Esc => InputOutcome::Cancel,
        KeyCode::Backspace => {
            buffer.pop();
            InputOutcome::Edited
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            buffer.push(c);
            InputOutcome::Edited
        }
        _ => InputOutcome::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn navigation_on_empty_list_is_safe() {
        let mut list: StatefulList<u8> = StatefulList::with_items(vec![]);
        list.next();
        list.previous();
        assert_eq!(list.state.selected(), None);
        assert!(list.selected().is_none());
    }

    #[test]
    fn navigation_stops_at_edges() {
        let mut list = StatefulList::with_items(vec![1, 2, 3]);
        list.previous();
        assert_eq!(list.selected(), Some(&1));
        list.next();
        list.next();
        list.next();
        assert_eq!(list.selected(), Some(&3));
    }

    #[test]
    fn replace_items_clamps_selection() {
        let mut list = StatefulList::with_items(vec![1, 2, 3]);
        list.next();
        list.next();
        list.replace_items(vec![7]);
        assert_eq!(list.selected(), Some(&7));
        list.replace_items(vec![]);
        assert_eq!(list.state.selected(), None);
        list.replace_items(vec![4, 5]);
        assert_eq!(list.selected(), Some(&4));
    }

    #[test]
    fn text_keys() {
        let mut buf = String::new();
        assert_eq!(apply_text_key(&mut buf, key(KeyCode::Char('h')), false), InputOutcome::Edited);
        assert_eq!(apply_text_key(&mut buf, key(KeyCode::Char('i')), false), InputOutcome::Edited);
        assert_eq!(apply_text_key(&mut buf, key(KeyCode::Backspace), false), InputOutcome::Edited);
        assert_eq!(buf, "h");
        assert_eq!(apply_text_key(&mut buf, key(KeyCode::Enter), false), InputOutcome::Submit);
        assert_eq!(apply_text_key(&mut buf, key(KeyCode::Esc), false), InputOutcome::Cancel);
        assert_eq!(apply_text_key(&mut buf, key(KeyCode::Tab), false), InputOutcome::Ignored);

        let alt_enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT);
        assert_eq!(apply_text_key(&mut buf, alt_enter, true), InputOutcome::Edited);
        assert_eq!(buf, "h\n");
        assert_eq!(apply_text_key(&mut buf, alt_enter, false), InputOutcome::Submit);
    }
}
