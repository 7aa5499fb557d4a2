// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use rstest::rstest;
use url::Url;

use super::{Contents, GitHubProvider, entry_from_content};
use crate::{EntryKind, Repository};

const LISTING: &str = r#"[
  {"type": "dir", "name": "src", "path": "src", "size": 0,
   "html_url": "https://github.com/fioncat/grfs/tree/main/src"},
  {"type": "file", "name": "README.md", "path": "README.md", "size": 1024,
   "html_url": "https://github.com/fioncat/grfs/blob/main/README.md"},
  {"type": "symlink", "name": "latest", "path": "latest", "size": 6, "target": "src/v2"},
  {"type": "submodule", "name": "vendor", "path": "vendor", "size": 0}
]"#;

fn url() -> Url {
    Url::parse("https://api.github.com/repos/fioncat/grfs/contents").unwrap()
}

#[rstest]
fn test_listing_to_entries() {
    let Contents::Dir(items) = serde_json::from_str(LISTING).unwrap() else {
        panic!("a json array should decode as a directory listing");
    };
    let entries = items
        .into_iter()
        .map(|c| entry_from_content(&url(), c))
        .collect::<crate::Result<Vec<_>>>()
        .unwrap();

    let kinds: Vec<_> = entries.iter().map(|e| (e.name.as_str(), e.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            ("src", EntryKind::Dir),
            ("README.md", EntryKind::File),
            ("latest", EntryKind::Symlink),
            ("vendor", EntryKind::Dir),
        ]
    );
    assert_eq!(entries[1].size, 1024);
    assert_eq!(
        entries[1].web_url,
        "https://github.com/fioncat/grfs/blob/main/README.md"
    );
    assert_eq!(entries[2].link_name, "src/v2");
}

#[rstest]
fn test_single_item_decodes_as_item() {
    let contents: Contents =
        serde_json::from_str(r#"{"type": "file", "name": "a", "path": "a", "size": 1}"#).unwrap();
    assert!(matches!(contents, Contents::Item(_)));
}

#[rstest]
#[case(r#"{"type": "file", "name": "", "path": "a"}"#)]
#[case(r#"{"type": "", "name": "a", "path": "a"}"#)]
#[case(r#"{"type": "device", "name": "a", "path": "a"}"#)]
fn test_invalid_entries(#[case] raw: &str) {
    let Contents::Item(item) = serde_json::from_str(raw).unwrap() else {
        panic!("expected a single item");
    };
    entry_from_content(&url(), *item).expect_err("entry should be rejected");
}

#[rstest]
#[case(Repository::new("github.com", "fioncat", "grfs"), "", "https://api.github.com/repos/fioncat/grfs/contents")]
#[case(
    Repository::new("github.com", "fioncat", "grfs").with_reference("feat/x"),
    "src/main.rs",
    "https://api.github.com/repos/fioncat/grfs/contents/src/main.rs?ref=feat%2Fx"
)]
#[case(
    Repository::new("git.example.com", "team", "tool"),
    "docs",
    "https://git.example.com/api/v3/repos/team/tool/contents/docs"
)]
fn test_contents_url(#[case] repo: Repository, #[case] path: &str, #[case] expected: &str) {
    let provider = GitHubProvider::new(repo, None).unwrap();
    assert_eq!(provider.contents_url(path).unwrap().as_str(), expected);
}
