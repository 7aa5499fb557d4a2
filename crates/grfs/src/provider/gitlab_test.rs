// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use rstest::{fixture, rstest};

use super::{GitLabProvider, Pending, TreeNode};
use crate::{Entry, Repository};

#[fixture]
fn provider() -> GitLabProvider {
    let repo = Repository::new("my-gitlab.com", "k8s/devops", "etcdhelper");
    GitLabProvider::new(repo, Some("token")).unwrap()
}

fn node(kind: &str, path: &str, mode: &str) -> TreeNode {
    TreeNode {
        kind: kind.into(),
        name: path.rsplit('/').next().unwrap().into(),
        path: path.into(),
        mode: mode.into(),
    }
}

#[rstest]
fn test_project_url_encodes_nested_owner(provider: GitLabProvider) {
    let mut url = provider
        .project_url(["repository", "files", "cmd/main.go", "raw"])
        .unwrap();
    url.query_pairs_mut().append_pair("ref", "feat/errlog");
    assert_eq!(
        url.as_str(),
        "https://my-gitlab.com/api/v4/projects/k8s%2Fdevops%2Fetcdhelper/repository/files/cmd%2Fmain.go/raw?ref=feat%2Ferrlog"
    );
}

#[rstest]
fn test_classify_tree_nodes(provider: GitLabProvider) {
    let url = provider.project_url(["repository", "tree"]).unwrap();
    let classify = |n| provider.classify(&url, "main", n).unwrap();

    assert_eq!(
        classify(node("tree", "cmd", "040000")),
        Pending::Done(
            Entry::dir("cmd").with_web_url("https://my-gitlab.com/k8s/devops/etcdhelper/-/tree/main/cmd")
        )
    );
    assert_eq!(
        classify(node("commit", "vendor/lib", "160000")),
        Pending::Done(Entry::dir("vendor/lib").with_web_url(
            "https://my-gitlab.com/k8s/devops/etcdhelper/-/tree/main/vendor/lib"
        ))
    );
    assert_eq!(
        classify(node("blob", "cmd/main.go", "100644")),
        Pending::Size("cmd/main.go".into())
    );
    assert_eq!(
        classify(node("blob", "latest", "120000")),
        Pending::Target("latest".into())
    );
}

#[rstest]
#[case(node("blob", "", "100644"))]
#[case(node("unknown", "a", "100644"))]
fn test_classify_invalid_nodes(provider: GitLabProvider, #[case] node: TreeNode) {
    let url = provider.project_url(["repository", "tree"]).unwrap();
    provider
        .classify(&url, "main", node)
        .expect_err("node should be rejected");
}

#[rstest]
fn test_tree_node_decoding() {
    let nodes: Vec<TreeNode> = serde_json::from_str(
        r#"[{"id": "a1", "name": "README.md", "type": "blob", "path": "README.md", "mode": "100644"}]"#,
    )
    .unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].kind, "blob");
    assert_eq!(nodes[0].mode, "100644");
}
