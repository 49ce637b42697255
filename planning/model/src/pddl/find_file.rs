//! Discovery of the domain file of a PDDL problem from the usual naming conventions.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::{Message, Res, errors::Title};

/// Domain file names derived from the name of the problem file: a pattern on the problem file name and
/// the replacement giving the domain file name.
const CONVENTIONS: &[(&str, &str)] = &[
    (r"^(.+)\.[^.]+\.pb\.pddl$", "$1.dom.pddl"),
    (r"^(.+)\.pb\.pddl$", "$1.dom.pddl"),
    (r"^(.+)\.pddl$", "$1-domain.pddl"),
    (r"^(.+)\.pddl$", "domain-$1.pddl"),
    (r"^instance-([1-9]+)\.pddl$", "domain-$1.pddl"),
];

/// Candidate names of the domain file, most likely first.
fn candidate_names(problem_name: &str, extension: Option<&str>) -> Res<Vec<String>> {
    let mut names = vec![format!("domain.{}", extension.unwrap_or("pddl"))];
    for (pattern, replacement) in CONVENTIONS {
        let re = Regex::new(pattern).map_err(|e| Message::error(format!("invalid pattern `{pattern}`: {e}")))?;
        if re.is_match(problem_name) {
            let name = re.replace(problem_name, *replacement).into_owned();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    Ok(names)
}

/// Directory of the problem, its parent and a `domains` directory next to it.
fn candidate_dirs(problem_file: &Path) -> Vec<PathBuf> {
    let Some(dir) = problem_file.parent() else {
        return Vec::new();
    };
    let mut dirs = vec![dir.to_path_buf()];
    if let Some(parent) = dir.parent() {
        dirs.push(parent.to_path_buf());
        dirs.push(parent.join("domains"));
    }
    dirs
}

/// Finds the domain file of a problem file, e.g. `domain.pddl` in the same directory.
pub fn find_domain_of(problem_file: &Path) -> Res<PathBuf> {
    let problem_name = problem_file
        .file_name()
        .and_then(|n| n.to_str())
        .title("invalid problem file name")?;
    let extension = problem_file.extension().and_then(|e| e.to_str());
    let names = candidate_names(problem_name, extension)?;
    let dirs = candidate_dirs(problem_file);
    names
        .iter()
        .flat_map(|name| dirs.iter().map(move |dir| dir.join(name)))
        .find(|candidate| candidate.exists())
        .ok_or_else(|| {
            Message::error(format!(
                "no domain file found for {}, tried: {}",
                problem_file.display(),
                names.join(", ")
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_conventions() -> Res<()> {
        assert_eq!(
            candidate_names("p01.pb.pddl", Some("pddl"))?,
            ["domain.pddl", "p01.dom.pddl", "p01.pb-domain.pddl", "domain-p01.pb.pddl"]
        );
        assert!(candidate_names("rover.p01.pb.pddl", Some("pddl"))?.contains(&"rover.dom.pddl".to_string()));
        assert!(candidate_names("instance-3.pddl", Some("pddl"))?.contains(&"domain-3.pddl".to_string()));
        assert_eq!(candidate_names("problem", None)?, ["domain.pddl"]);
        Ok(())
    }

    #[test]
    fn domain_in_parent_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let instances = dir.path().join("instances");
        std::fs::create_dir(&instances)?;
        let problem = instances.join("instance-2.pddl");
        std::fs::write(&problem, "")?;
        assert!(find_domain_of(&problem).is_err());

        std::fs::write(dir.path().join("domain-2.pddl"), "")?;
        assert_eq!(find_domain_of(&problem)?, dir.path().join("domain-2.pddl"));
        std::fs::write(instances.join("domain.pddl"), "")?;
        assert_eq!(find_domain_of(&problem)?, instances.join("domain.pddl"));
        Ok(())
    }
}
