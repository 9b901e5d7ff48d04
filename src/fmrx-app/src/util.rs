// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

/// Registry key for a backend name: lowercase ASCII words joined by `-`.
///
/// Surrounding whitespace is dropped and any run of `-`, `_`, `.` or
/// whitespace collapses into a single `-`, so `" SI4705_Sim "` and
/// `"si4705-sim"` name the same backend.
pub fn backend_key(name: &str) -> String {
    name.split(|c: char| c == '-' || c == '_' || c == '.' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}
