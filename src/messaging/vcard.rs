//! vCard 3.0 contact cards

use crate::identity::decompose;

/// Build a single-number contact card.
///
/// The number is normalized first, so `+628123` and `628123` produce the
/// same card.
pub fn contact_card(name: &str, number: &str) -> String {
    let number = decompose(number);
    format!(
        "BEGIN:VCARD\nVERSION:3.0\nN:;{name};;;\nFN:{name}\nTEL;type=CELL;waid={number}:+{number}\nEND:VCARD"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_card_layout() {
        assert_eq!(
            contact_card("Budi", "628123456789"),
            "BEGIN:VCARD\nVERSION:3.0\nN:;Budi;;;\nFN:Budi\nTEL;type=CELL;waid=628123456789:+628123456789\nEND:VCARD"
        );
    }

    #[test]
    fn test_contact_card_normalizes_number() {
        assert_eq!(contact_card("Budi", "+628123"), contact_card("Budi", "628123"));
    }
}
