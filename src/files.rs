use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use glob::glob;

/// Explicit paths first, in the order given, then glob matches in glob order.
/// Paths are not checked for existence here; a missing input is a per-file failure.
pub fn resolve_inputs(explicit: &[PathBuf], globs: &[String]) -> Result<Vec<PathBuf>> {
    let mut inputs = explicit.to_vec();

    for pattern in globs {
        let matches =
            glob(pattern).map_err(|err| anyhow!("invalid glob pattern '{pattern}': {err}"))?;
        for entry in matches {
            let path =
                entry.map_err(|err| anyhow!("error reading matches for '{pattern}': {err}"))?;
            if path.is_file() {
                inputs.push(path);
            }
        }
    }

    Ok(inputs)
}

/// Output location for `input`: its base name inside `output_dir`.
pub fn output_path_for(output_dir: &Path, input: &Path) -> Option<PathBuf> {
    input.file_name().map(|name| output_dir.join(name))
}

pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn explicit_paths_keep_order_and_duplicates() {
        let inputs = resolve_inputs(
            &[
                PathBuf::from("b.txt"),
                PathBuf::from("a.txt"),
                PathBuf::from("b.txt"),
            ],
            &[],
        )
        .expect("resolve");
        assert_eq!(
            inputs,
            vec![
                PathBuf::from("b.txt"),
                PathBuf::from("a.txt"),
                PathBuf::from("b.txt")
            ]
        );
    }

    #[test]
    fn globs_expand_to_files_only() {
        let temp = tempdir().expect("temp dir");
        std::fs::write(temp.path().join("Fled-1.txt"), "x").expect("write");
        std::fs::write(temp.path().join("Immi-1.txt"), "x").expect("write");
        std::fs::create_dir(temp.path().join("dir.txt")).expect("dir");

        let pattern = format!("{}/*.txt", temp.path().display());
        let inputs = resolve_inputs(&[], &[pattern]).expect("resolve");
        assert_eq!(inputs.len(), 2);
        assert!(inputs.iter().all(|path| path.is_file()));
    }

    #[test]
    fn invalid_glob_is_reported() {
        let err = resolve_inputs(&[], &["[".to_string()]).expect_err("bad glob");
        assert!(err.to_string().contains("invalid glob pattern"));
    }

    #[test]
    fn output_keeps_base_name() {
        let out = output_path_for(Path::new("/out"), Path::new("/data/in/Fled-0214.txt"));
        assert_eq!(out, Some(PathBuf::from("/out/Fled-0214.txt")));
        assert_eq!(output_path_for(Path::new("/out"), Path::new("/")), None);
        assert_eq!(base_name(Path::new("dir/Immi-1.txt")), "Immi-1.txt");
    }
}
