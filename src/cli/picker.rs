//! Interactive scan picker.
//!
//! Used by `hvscan fit` when no files are given. Scan CSVs below the working
//! directory are listed; working-point companions (`*_WP.csv`) are not offered.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Directory levels searched below the working directory.
const DEFAULT_SEARCH_DEPTH: usize = 3;

/// Prompt the user to select scan files from the current directory tree.
///
/// Behavior:
/// - list discovered scan CSVs
/// - accept numbers (`1 3 4`, `1,3`), `a` for all, or an explicit path
/// - `q` cancels
pub fn prompt_for_scan_paths() -> Result<Vec<PathBuf>, AppError> {
    let files = discover_scan_files();
    if files.is_empty() {
        return Err(AppError::new(
            2,
            "No scan .csv files found. Pass them explicitly: `hvscan fit <scan.csv>...`.",
        ));
    }

    println!("Found {} scan file(s):", files.len());
    for (idx, path) in files.iter().enumerate() {
        println!("{:>3}) {}", idx + 1, pretty_path(path));
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock();
    loop {
        print!("Select scans by number (1-{}), `a` for all, or type a path (q to quit): ", files.len());
        io::stdout()
            .flush()
            .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;

        let mut input = String::new();
        let bytes = lines
            .read_line(&mut input)
            .map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;

        if bytes == 0 {
            return Err(AppError::new(
                2,
                "No input received. Pass scan files with `hvscan fit <scan.csv>...`.",
            ));
        }

        match parse_selection(input.trim(), &files) {
            Selection::Quit => return Err(AppError::new(2, "Canceled.")),
            Selection::Files(paths) => return Ok(paths),
            Selection::Path(candidate) => match validate_csv_path(&candidate) {
                Ok(path) => return Ok(vec![path]),
                Err(err) => println!("{err}"),
            },
            Selection::Invalid(msg) => println!("{msg}"),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Selection {
    Quit,
    Files(Vec<PathBuf>),
    Path(PathBuf),
    Invalid(String),
}

fn parse_selection(input: &str, files: &[PathBuf]) -> Selection {
    if input.eq_ignore_ascii_case("q") {
        return Selection::Quit;
    }
    if input.eq_ignore_ascii_case("a") {
        return Selection::Files(files.to_vec());
    }

    let tokens: Vec<&str> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return Selection::Invalid("Nothing selected.".to_string());
    }

    if tokens.iter().all(|t| t.parse::<usize>().is_ok()) {
        let mut picked = Vec::new();
        for t in tokens {
            let choice: usize = t.parse().unwrap_or(0);
            if !(1..=files.len()).contains(&choice) {
                return Selection::Invalid(format!(
                    "Invalid choice: {choice}. Enter numbers between 1 and {}.",
                    files.len()
                ));
            }
            let path = files[choice - 1].clone();
            if !picked.contains(&path) {
                picked.push(path);
            }
        }
        return Selection::Files(picked);
    }

    Selection::Path(PathBuf::from(input))
}

/// Accept `path` only if it is an existing `.csv` file.
pub fn validate_csv_path(path: &Path) -> Result<PathBuf, AppError> {
    let meta = fs::metadata(path)
        .map_err(|_| AppError::new(2, format!("Scan file not found: {}", path.display())))?;
    if !meta.is_file() {
        return Err(AppError::new(2, format!("Not a regular file: {}", path.display())));
    }
    if !is_csv(path) {
        return Err(AppError::new(2, format!("Scans are read from .csv files (got: {}).", path.display())));
    }
    Ok(path.to_path_buf())
}

/// Scan CSVs under the current directory, sorted by display path.
pub fn discover_scan_files() -> Vec<PathBuf> {
    find_scan_files(Path::new("."), DEFAULT_SEARCH_DEPTH)
}

fn find_scan_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![(root.to_path_buf(), 0usize)];

    while let Some((dir, depth)) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => {
                    if depth < max_depth && !is_hidden_or_build_dir(&path) {
                        pending.push((path, depth + 1));
                    }
                }
                Ok(ft) if ft.is_file() && is_csv(&path) && !is_wp_companion(&path) => found.push(path),
                _ => {}
            }
        }
    }

    found.sort_by_key(|p| pretty_path(p));
    found
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// `<stem>_WP.csv` files hold background rates, not scans.
fn is_wp_companion(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with("_WP"))
}

fn is_hidden_or_build_dir(path: &Path) -> bool {
    match path.file_name().and_then(|s| s.to_str()) {
        Some(name) => name.starts_with('.') || name == "target",
        None => false,
    }
}

fn pretty_path(path: &Path) -> String {
    path.strip_prefix(".").unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> Vec<PathBuf> {
        vec![PathBuf::from("a.csv"), PathBuf::from("b.csv"), PathBuf::from("c.csv")]
    }

    #[test]
    fn numbers_select_in_order_without_duplicates() {
        assert_eq!(
            parse_selection("3, 1 3", &files()),
            Selection::Files(vec![PathBuf::from("c.csv"), PathBuf::from("a.csv")])
        );
        assert_eq!(parse_selection("A", &files()), Selection::Files(files()));
        assert_eq!(parse_selection("q", &files()), Selection::Quit);
    }

    #[test]
    fn out_of_range_and_paths() {
        assert!(matches!(parse_selection("4", &files()), Selection::Invalid(_)));
        assert_eq!(
            parse_selection("data/STDMX_OFF.csv", &files()),
            Selection::Path(PathBuf::from("data/STDMX_OFF.csv"))
        );
    }

    #[test]
    fn wp_companions_are_not_offered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["STDMX_OFF.csv", "STDMX_OFF_WP.csv", "notes.txt"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        let found = find_scan_files(dir.path(), 1);
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("STDMX_OFF.csv"));
    }
}
