use crate::app::InputMode;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Back,
    Interrupt,
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
    Open,
    Logs,
    Metrics,
    Exec,
    Delete,
    Restart,
    Namespaces,
    Contexts,
    Refresh,
    SubmitInput,
    CancelInput,
    Backspace,
    InputChar(char),
    ConfirmYes,
    ConfirmNo,
}

pub fn map_key(mode: InputMode, key: KeyEvent) -> Option<Action> {
    if is_interrupt(key) {
        return Some(Action::Interrupt);
    }
    match mode {
        InputMode::Normal => map_normal_mode_key(key),
        InputMode::Prompt => map_prompt_key(key),
        InputMode::Confirm => Some(map_confirm_key(key)),
    }
}

fn is_interrupt(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        && key.modifiers.contains(KeyModifiers::CONTROL)
}

fn map_normal_mode_key(key: KeyEvent) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('u') if ctrl => Some(Action::PageUp),
        KeyCode::Char('d') if ctrl => Some(Action::PageDown),
        _ if ctrl => None,
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Esc => Some(Action::Back),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::Up),
        KeyCode::Char('j') | KeyCode::Down => Some(Action::Down),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::Char('g') | KeyCode::Home => Some(Action::Top),
        KeyCode::Char('G') | KeyCode::End => Some(Action::Bottom),
        KeyCode::Enter => Some(Action::Open),
        KeyCode::Char('l') => Some(Action::Logs),
        KeyCode::Char('m') => Some(Action::Metrics),
        KeyCode::Char('e') => Some(Action::Exec),
        KeyCode::Char('d') => Some(Action::Delete),
        KeyCode::Char('o') => Some(Action::Restart),
        KeyCode::Char('c') => Some(Action::Namespaces),
        KeyCode::Char('x') => Some(Action::Contexts),
        KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
        _ => None,
    }
}

fn map_prompt_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::CancelInput),
        KeyCode::Enter => Some(Action::SubmitInput),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::InputChar(c))
        }
        _ => None,
    }
}

/// Anything other than an explicit yes declines.
fn map_confirm_key(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Action::ConfirmYes,
        _ => Action::ConfirmNo,
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, map_key};
    use crate::app::InputMode;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn normal_mode_maps_quit_and_back() {
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('q'))),
            Some(Action::Quit)
        );
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Esc)),
            Some(Action::Back)
        );
    }

    #[test]
    fn ctrl_c_interrupts_in_every_mode() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        for mode in [InputMode::Normal, InputMode::Prompt, InputMode::Confirm] {
            assert_eq!(map_key(mode, ctrl_c), Some(Action::Interrupt));
        }
    }

    #[test]
    fn plain_c_opens_namespace_selector() {
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('c'))),
            Some(Action::Namespaces)
        );
    }

    #[test]
    fn ctrl_d_pages_instead_of_deleting() {
        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(map_key(InputMode::Normal, ctrl_d), Some(Action::PageDown));
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('d'))),
            Some(Action::Delete)
        );
    }

    #[test]
    fn prompt_mode_maps_chars_including_q() {
        assert_eq!(
            map_key(InputMode::Prompt, key(KeyCode::Char('q'))),
            Some(Action::InputChar('q'))
        );
        assert_eq!(
            map_key(InputMode::Prompt, key(KeyCode::Esc)),
            Some(Action::CancelInput)
        );
    }

    #[test]
    fn confirm_mode_declines_anything_but_yes() {
        assert_eq!(
            map_key(InputMode::Confirm, key(KeyCode::Char('Y'))),
            Some(Action::ConfirmYes)
        );
        assert_eq!(
            map_key(InputMode::Confirm, key(KeyCode::Enter)),
            Some(Action::ConfirmYes)
        );
        assert_eq!(
            map_key(InputMode::Confirm, key(KeyCode::Char('q'))),
            Some(Action::ConfirmNo)
        );
        assert_eq!(
            map_key(InputMode::Confirm, key(KeyCode::Esc)),
            Some(Action::ConfirmNo)
        );
    }
}
