/// Size formatting utilities — human-readable byte counts.
///
/// All internal sizes are `u64` bytes. Floating point is only used
/// at the display-formatting boundary.

const UNITS: [(&str, u64); 4] = [
    ("TB", 1 << 40),
    ("GB", 1 << 30),
    ("MB", 1 << 20),
    ("KB", 1 << 10),
];

/// Format a byte count into a human-readable string with appropriate unit.
///
/// Binary units (1 KB = 1024 B here), with one decimal up to MB and two
/// from GB where the rounding error starts to matter.
pub fn format_size(bytes: u64) -> String {
    for (label, threshold) in UNITS {
        if bytes >= threshold {
            let value = bytes as f64 / threshold as f64;
            let decimals = if threshold >= 1 << 30 { 2 } else { 1 };
            return format!("{value:.decimals$} {label}");
        }
    }
    format!("{bytes} B")
}

/// Format an item count with thousand separators.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    if digits.len() <= 3 {
        return digits;
    }
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let lead = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
