use std::io::{self, Write};

use prsweep::{DisplayMode, RepositoryPrs};

const TITLE_WIDTH: usize = 72;

fn truncate_title(title: &str) -> String {
    if title.chars().count() <= TITLE_WIDTH {
        return title.to_string();
    }
    let truncated: String = title.chars().take(TITLE_WIDTH - 3).collect();
    format!("{truncated}...")
}

/// Lists the selected pull requests, one per line.
pub fn display_prs<W: Write>(
    results: &[RepositoryPrs],
    mode: DisplayMode,
    writer: &mut W,
) -> io::Result<()> {
    for repo_prs in results {
        for pr in &repo_prs.prs {
            match mode {
                DisplayMode::Quiet => writeln!(writer, "{}", pr.number)?,
                DisplayMode::Normal => writeln!(
                    writer,
                    "{}#{}\t{}\t{}\t{}",
                    repo_prs.repo,
                    pr.number,
                    pr.ci_status(),
                    pr.author_login,
                    truncate_title(&pr.title)
                )?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use prsweep::{PullRequest, Repo};

    use super::*;

    fn results() -> Vec<RepositoryPrs> {
        let repo = Repo::parse("o/r").unwrap();
        let prs = [(12, "Fix the flaky test"), (7, &*"x".repeat(100))]
            .into_iter()
            .map(|(number, title)| PullRequest {
                repo: repo.clone(),
                number,
                title: title.to_string(),
                author_login: "alice".to_string(),
                labels: vec![],
                url: format!("https://github.com/o/r/pull/{number}"),
                state: "OPEN".to_string(),
                checks: vec![],
                comments: vec![],
            })
            .collect();
        vec![RepositoryPrs { repo, prs }]
    }

    #[test]
    fn test_quiet_prints_numbers() {
        let mut out = Vec::new();
        display_prs(&results(), DisplayMode::Quiet, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "12\n7\n");
    }

    #[test]
    fn test_normal_listing() {
        let mut out = Vec::new();
        display_prs(&results(), DisplayMode::Normal, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "o/r#12\tUnknown\talice\tFix the flaky test");
        assert!(lines[1].ends_with("..."));
        assert_eq!(lines[1].split('\t').nth(3).unwrap().chars().count(), TITLE_WIDTH);
    }
}
