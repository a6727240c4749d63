//! Luhn checksum for order numbers.

/// Check a digit string against the Luhn checksum.
///
/// Every second digit counting from the rightmost one is doubled (9 is
/// subtracted when the result exceeds 9) and the digit sum must be a
/// multiple of 10. Any non-digit character fails the check.
pub fn is_valid(number: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in number.bytes().rev().enumerate() {
        if !c.is_ascii_digit() {
            return false;
        }
        let mut digit = u32::from(c - b'0');
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}
