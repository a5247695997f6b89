/// Highest column the backend addresses (ZZZ).
pub const MAX_COLUMNS: u32 = 18_278;

/// Convert a 1-based column number to its letter form (1 -> A, 27 -> AA).
pub fn col_to_letter(col: u32) -> String {
    let mut col = col;
    let mut result = String::new();
    while col > 0 {
        col -= 1;
        result.push(((col % 26) as u8 + b'A') as char);
        col /= 26;
    }
    result.chars().rev().collect()
}

/// Quote a sheet title for use in an A1 range. Embedded single quotes are
/// doubled.
pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Range covering every column of the tab: `'Title'!A:ZZZ`.
pub fn full_width_range(title: &str) -> String {
    format!("{}!A:{}", quote_title(title), col_to_letter(MAX_COLUMNS))
}

/// Bare tab range, accepted even when the tab holds no data.
pub fn bare_range(title: &str) -> String {
    quote_title(title)
}
