/// Path display helpers.
use crate::platform::separator;

/// Shorten a path to fit `max_len` characters by replacing leading
/// components with "...", keeping the final component intact.
pub fn shorten_path(path: &str, max_len: usize) -> String {
    if path.len() <= max_len {
        return path.to_string();
    }

    let sep = separator();
    let (head, last) = match path.rfind(sep) {
        Some(pos) => (&path[..=pos], &path[pos + 1..]),
        None => ("", path),
    };

    let mut out = String::new();
    let mut used = last.len();
    for part in head.split_inclusive(sep) {
        used += part.len();
        if used > max_len {
            out.push_str("...");
            out.push(sep);
            break;
        }
        out.push_str(part);
    }
    out.push_str(last);
    out
}
