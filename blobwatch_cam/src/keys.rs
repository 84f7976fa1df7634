//! Keyboard bindings for the preview window.

use blobwatch::{ColorChannel, Command, LogSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Run(Command),
}

const ESCAPE: char = '\u{1b}';

/// Key help shown under the preview.
pub const HELP: &[&str] = &[
    "space learn background | m mode | p pause | i still | q quit | click pick color",
    "+/- threshold | ./, log interval 1ms | >/< 1s | f/c file/console | r reset time",
    "]/[ max area | }/{ max area x1000 | '/; min area | \"/: min area x1000",
    "1/2/3 raise r/g/b | !/@/# lower r/g/b | )/( color radius | s save | d delete | l reload",
];

/// Maps a key press to what it does, if anything.
pub fn action_for_key(key: char) -> Option<Action> {
    use Command::*;

    let command = match key {
        'q' | ESCAPE => return Some(Action::Quit),
        ' ' => LearnBackground,
        'm' => ToggleMode,
        'p' => TogglePause,
        'i' => CaptureStill,

        '+' => AdjustThreshold(1),
        '-' => AdjustThreshold(-1),

        '.' => AdjustLogInterval(1),
        ',' => AdjustLogInterval(-1),
        '>' => AdjustLogInterval(1000),
        '<' => AdjustLogInterval(-1000),
        'f' => SetLogSink(LogSink::File),
        'c' => SetLogSink(LogSink::Console),
        'r' => ResetTimeOrigin,

        ']' => AdjustMaxArea(1),
        '[' => AdjustMaxArea(-1),
        '}' => AdjustMaxArea(1000),
        '{' => AdjustMaxArea(-1000),
        '\'' => AdjustMinArea(1),
        ';' => AdjustMinArea(-1),
        '"' => AdjustMinArea(1000),
        ':' => AdjustMinArea(-1000),

        '1' => AdjustColorChannel(ColorChannel::Red, 1),
        '2' => AdjustColorChannel(ColorChannel::Green, 1),
        '3' => AdjustColorChannel(ColorChannel::Blue, 1),
        '!' => AdjustColorChannel(ColorChannel::Red, -1),
        '@' => AdjustColorChannel(ColorChannel::Green, -1),
        '#' => AdjustColorChannel(ColorChannel::Blue, -1),
        ')' => AdjustColorRadius(1),
        '(' => AdjustColorRadius(-1),

        's' => SaveConfig,
        'd' => DeleteConfig,
        'l' => ReloadConfig,
        _ => return None,
    };
    Some(Action::Run(command))
}

/// Decodes the value returned by `highgui::wait_key`. Negative means no key.
pub fn decode_key(code: i32) -> Option<char> {
    if code < 0 {
        return None;
    }
    char::from_u32((code & 0xFF) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_keys() {
        assert_eq!(action_for_key('}'), Some(Action::Run(Command::AdjustMaxArea(1000))));
        assert_eq!(action_for_key(';'), Some(Action::Run(Command::AdjustMinArea(-1))));
        assert_eq!(action_for_key(':'), Some(Action::Run(Command::AdjustMinArea(-1000))));
    }

    #[test]
    fn test_quit_and_unbound() {
        assert_eq!(action_for_key('q'), Some(Action::Quit));
        assert_eq!(action_for_key('\u{1b}'), Some(Action::Quit));
        assert_eq!(action_for_key('z'), None);
    }

    #[test]
    fn test_help_keys_are_bound() {
        for key in [' ', 'm', 'p', 'i', '+', '>', 'f', 'r', '}', '"', '#', ')', 's', 'd', 'l'] {
            assert!(action_for_key(key).is_some(), "{key:?} is listed in the help");
        }
    }

    #[test]
    fn test_decode_key_masks_modifiers() {
        assert_eq!(decode_key(-1), None);
        assert_eq!(decode_key(0x10_0000 | '+' as i32), Some('+'));
        assert_eq!(decode_key(' ' as i32), Some(' '));
    }
}
