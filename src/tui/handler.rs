use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    NextPane,
    PrevPane,
    MoveUp,
    MoveDown,
    StartEdit,
    Submit,
    RefreshAll,
    RefreshPane,
    CopyHtml,
    OpenSource,
    SignOut,
    ShowHelp,
    HideHelp,
    // Field input actions
    InputChar(char),
    InputBackspace,
    InputConfirm,
    InputCancel,
}

pub fn handle_key_event(key: KeyEvent, editing: bool, show_help: bool) -> Option<AppAction> {
    // If help is showing, any key closes it
    if show_help {
        return Some(AppAction::HideHelp);
    }

    if editing {
        return match key.code {
            KeyCode::Enter => Some(AppAction::InputConfirm),
            KeyCode::Esc => Some(AppAction::InputCancel),
            KeyCode::Backspace => Some(AppAction::InputBackspace),
            KeyCode::Char(c) => Some(AppAction::InputChar(c)),
            _ => None,
        };
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) => Some(AppAction::Quit),
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(AppAction::Quit),

        (KeyCode::Tab, _) => Some(AppAction::NextPane),
        (KeyCode::BackTab, _) => Some(AppAction::PrevPane),
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(AppAction::MoveDown),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(AppAction::MoveUp),

        (KeyCode::Enter, _) | (KeyCode::Char('e'), _) => Some(AppAction::StartEdit),
        (KeyCode::Char('s'), _) => Some(AppAction::Submit),
        (KeyCode::Char('r'), _) => Some(AppAction::RefreshAll),
        (KeyCode::Char('R'), _) => Some(AppAction::RefreshPane),
        (KeyCode::Char('c'), _) => Some(AppAction::CopyHtml),
        (KeyCode::Char('o'), _) => Some(AppAction::OpenSource),
        (KeyCode::Char('x'), _) => Some(AppAction::SignOut),

        (KeyCode::Char('?'), _) => Some(AppAction::ShowHelp),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn editing_captures_letters() {
        assert_eq!(
            handle_key_event(key(KeyCode::Char('q')), true, false),
            Some(AppAction::InputChar('q'))
        );
        assert_eq!(
            handle_key_event(key(KeyCode::Esc), true, false),
            Some(AppAction::InputCancel)
        );
    }

    #[test]
    fn help_swallows_any_key() {
        assert_eq!(
            handle_key_event(key(KeyCode::Char('s')), false, true),
            Some(AppAction::HideHelp)
        );
    }

    #[test]
    fn normal_mode_bindings() {
        assert_eq!(
            handle_key_event(key(KeyCode::Char('R')), false, false),
            Some(AppAction::RefreshPane)
        );
        assert_eq!(
            handle_key_event(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), false, false),
            Some(AppAction::Quit)
        );
        assert_eq!(
            handle_key_event(key(KeyCode::Char('c')), false, false),
            Some(AppAction::CopyHtml)
        );
    }
}
