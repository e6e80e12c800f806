use crate::meta::{append_meta_line, join_indices, line_ending, parse_pin_indices, MetaTag};
use crate::models::PinnedSection;

const PIN_PREFIX: &str = "meta::pin::";

pub fn extract_pinned_sections(content: &str) -> Vec<PinnedSection> {
    content
        .lines()
        .enumerate()
        .filter_map(|(line_index, line)| {
            line.strip_prefix(PIN_PREFIX).map(|raw| PinnedSection {
                indices: parse_pin_indices(raw),
                line_index,
            })
        })
        .collect()
}

/// Lines named by `indices`, in the order given. Missing and blank lines
/// are dropped.
pub fn get_pinned_section_content(content: &str, indices: &[usize]) -> String {
    let lines: Vec<&str> = content.lines().collect();
    indices
        .iter()
        .map(|index| lines.get(*index).copied().unwrap_or_default())
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn add_pin(content: &str, indices: &[usize]) -> String {
    append_meta_line(content, &MetaTag::Pin(indices.to_vec()).encode())
}

/// Removes the first pin line whose indices render to the same text as
/// `indices`. `[2,1]` does not remove a `1,2` pin.
pub fn remove_pin(content: &str, indices: &[usize]) -> String {
    if indices.is_empty() {
        return content.to_string();
    }

    let wanted = join_indices(indices);
    let Some(line_index) = content
        .lines()
        .position(|line| line.strip_prefix(PIN_PREFIX).is_some_and(|raw| pin_key(raw) == wanted))
    else {
        return content.to_string();
    };

    content
        .lines()
        .enumerate()
        .filter(|(index, _)| *index != line_index)
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join(line_ending(content))
}

/// Stored pin text in the form removal compares against. Each token reads
/// its leading digits, so `2x` is 2 and `01` is 1. A token with no leading
/// digits stays as written and never matches a requested index.
fn pin_key(raw: &str) -> String {
    raw.split(',')
        .map(|token| {
            let token = token.trim();
            let digits = token.split(|c: char| !c.is_ascii_digit()).next().unwrap_or_default();
            digits
                .parse::<usize>()
                .map(|index| index.to_string())
                .unwrap_or_else(|_| token.to_string())
        })
        .collect::<Vec<_>>()
        .join(",")
}
