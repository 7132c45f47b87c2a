use proc_macro::TokenStream;
use quote::quote;
use syn::{LitStr, parse_macro_input};

/// Builds a `tonebank::melody::Note` from a note name at compile time.
///
/// The pitch is resolved to its equal-tempered frequency (A4 = 440 Hz)
/// while the crate is compiled, so melody tables cost nothing at runtime.
///
/// # Format
///
/// `<letter>[#|b][octave]`:
/// - `letter` is one of A-G (case insensitive)
/// - `#` raises and `b` lowers by a semitone
/// - `octave` ranges over -1..=9 and defaults to 4
///
/// `"rest"` (or `"-"`) yields a silent note with a pitch of 0 Hz.
///
/// # Examples
///
/// ```ignore
/// use tonebank::note;
///
/// let e5 = note!("E5");
/// let middle_c = note!("C");
/// let b_flat = note!("Bb3");
/// let pause = note!("rest");
/// ```
#[proc_macro]
pub fn note(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as LitStr);
    let text = input.value();

    match parse_note(&text) {
        Ok(midi) => {
            let pitch = midi.map(midi_to_hz).unwrap_or(0.0);
            TokenStream::from(quote! {
                ::tonebank::melody::Note { pitch: #pitch }
            })
        }
        Err(reason) => {
            let message = format!("invalid note '{}': {}", text, reason);
            TokenStream::from(quote! { compile_error!(#message) })
        }
    }
}

fn letter_semitone(letter: char) -> Option<i16> {
    match letter.to_ascii_uppercase() {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Parses a note name into a MIDI note number; `None` is a rest.
fn parse_note(text: &str) -> Result<Option<u8>, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty string".to_string());
    }
    if text.eq_ignore_ascii_case("rest") || text == "-" {
        return Ok(None);
    }

    let mut chars = text.chars();
    let letter = chars.next().ok_or("empty string")?;
    let mut semitone =
        letter_semitone(letter).ok_or_else(|| format!("unknown pitch letter '{}'", letter))?;

    let rest = chars.as_str();
    let rest = if let Some(stripped) = rest.strip_prefix('#') {
        semitone += 1;
        stripped
    } else if let Some(stripped) = rest.strip_prefix('b') {
        semitone -= 1;
        stripped
    } else {
        rest
    };

    let octave: i16 = if rest.is_empty() {
        4
    } else {
        rest.parse()
            .map_err(|_| format!("invalid octave '{}'", rest))?
    };
    if !(-1..=9).contains(&octave) {
        return Err(format!("octave {} out of range (-1 to 9)", octave));
    }

    let midi = (octave + 1) * 12 + semitone;
    u8::try_from(midi)
        .ok()
        .filter(|m| *m <= 127)
        .map(Some)
        .ok_or_else(|| format!("note is outside the MIDI range ({})", midi))
}

fn midi_to_hz(midi: u8) -> f64 {
    440.0 * 2.0_f64.powf((f64::from(midi) - 69.0) / 12.0)
}
