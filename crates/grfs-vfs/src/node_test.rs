// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use fuser::FileType;
use grfs::{Entry, OsError, Provider};
use rstest::{fixture, rstest};

use super::{Node, ROOT_INODE};
use crate::attr::Ownership;

/// Serves a fixed tree, counting and optionally failing requests.
#[derive(Default)]
struct MockProvider {
    dirs: HashMap<String, Vec<Entry>>,
    files: HashMap<String, Bytes>,
    delay: Duration,
    failures: AtomicUsize,
    dir_calls: AtomicUsize,
    file_calls: AtomicUsize,
}

impl MockProvider {
    fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    fn should_fail(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn failure(path: &str) -> grfs::Error {
        grfs::Error::HttpStatus {
            url: format!("https://example.com/{path}"),
            status: 502,
            message: String::from("Bad Gateway"),
        }
    }
}

#[grfs::async_trait]
impl Provider for MockProvider {
    async fn check(&self) -> grfs::Result<Option<String>> {
        Ok(Some(String::from("main")))
    }

    async fn read_dir(&self, path: &str) -> grfs::Result<Vec<Entry>> {
        self.dir_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.should_fail() {
            return Err(Self::failure(path));
        }
        Ok(self.dirs.get(path).cloned().unwrap_or_default())
    }

    async fn read_file(&self, path: &str) -> grfs::Result<Bytes> {
        self.file_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.should_fail() {
            return Err(Self::failure(path));
        }
        self.files.get(path).cloned().ok_or_else(|| Self::failure(path))
    }
}

#[fixture]
fn provider() -> MockProvider {
    let mut provider = MockProvider::default();
    provider.dirs.insert(
        String::new(),
        vec![
            Entry::file("README.md", 11),
            Entry::dir("src"),
            Entry::file("empty.txt", 0),
            Entry::symlink("latest", "src/main.rs"),
            Entry::file("Cargo.toml", 5000),
        ],
    );
    provider
        .dirs
        .insert(String::from("src"), vec![Entry::file("src/main.rs", 12)]);
    provider
        .files
        .insert(String::from("README.md"), Bytes::from_static(b"hello world"));
    provider
        .files
        .insert(String::from("empty.txt"), Bytes::new());
    provider
        .files
        .insert(String::from("src/main.rs"), Bytes::from_static(b"fn main() {}"));
    provider
}

fn mount(provider: MockProvider) -> (Arc<MockProvider>, Arc<Node>) {
    let provider = Arc::new(provider);
    let root = Node::root(provider.clone(), Ownership::fixed(1000, 100));
    (provider, root)
}

#[rstest]
#[tokio::test]
async fn test_readdir_sorted_and_stable(provider: MockProvider) {
    let (provider, root) = mount(provider);
    assert_eq!(root.ino(), ROOT_INODE);

    let first: Vec<_> = root
        .readdir()
        .await
        .unwrap()
        .iter()
        .map(|c| (c.ino(), c.name().to_string(), c.kind()))
        .collect();
    let names: Vec<_> = first.iter().map(|(_, name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Cargo.toml", "README.md", "empty.txt", "latest", "src"]
    );
    assert_eq!(first[3].2, FileType::Symlink);
    assert_eq!(first[4].2, FileType::Directory);
    assert!(first.iter().all(|(ino, _, _)| *ino != ROOT_INODE));

    let second: Vec<_> = root
        .readdir()
        .await
        .unwrap()
        .iter()
        .map(|c| (c.ino(), c.name().to_string(), c.kind()))
        .collect();
    assert_eq!(first, second, "listing should not change once loaded");
    assert_eq!(provider.dir_calls.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readdir_concurrent_single_fetch(mut provider: MockProvider) {
    provider.delay = Duration::from_millis(50);
    let (provider, root) = mount(provider);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let root = Arc::clone(&root);
            tokio::spawn(async move { root.readdir().await.map(|c| c.len()) })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 5);
    }
    assert_eq!(
        provider.dir_calls.load(Ordering::SeqCst),
        1,
        "concurrent listings should share one request"
    );
}

#[rstest]
#[tokio::test]
async fn test_readdir_retries_after_failure(provider: MockProvider) {
    let (provider, root) = mount(provider);
    provider.fail_next(1);

    let err = root.readdir().await.err().expect("first listing should fail");
    assert_eq!(err.os_error(), Some(libc::EIO));

    let children = root.readdir().await.expect("second listing should succeed");
    assert_eq!(children.len(), 5);
    assert_eq!(provider.dir_calls.load(Ordering::SeqCst), 2);
}

#[rstest]
#[tokio::test]
async fn test_lookup(provider: MockProvider) {
    let (_provider, root) = mount(provider);

    let err = root
        .lookup("missing.txt")
        .await
        .err()
        .expect("missing entry should not be found");
    assert_eq!(err.os_error(), Some(libc::ENOENT));

    let node = root.lookup("README.md").await.unwrap();
    let listed = root
        .readdir()
        .await
        .unwrap()
        .iter()
        .find(|c| c.name() == "README.md")
        .map(|c| c.ino())
        .unwrap();
    assert_eq!(node.ino(), listed);

    let attr = node.attr();
    assert_eq!(attr.ino, listed);
    assert_eq!(attr.kind, FileType::RegularFile);
    assert_eq!(attr.size, 11);
    assert_eq!(attr.perm, 0o644);
    assert_eq!(attr.nlink, 1);
    assert_eq!((attr.uid, attr.gid), (1000, 100));

    let again = root.lookup("README.md").await.unwrap();
    assert!(Arc::ptr_eq(&node, &again), "lookup should reuse the node");
}

#[rstest]
#[tokio::test]
async fn test_lookup_nested(provider: MockProvider) {
    let (_provider, root) = mount(provider);
    let src = root.lookup("src").await.unwrap();
    let main = src.lookup("main.rs").await.unwrap();
    assert_eq!(main.entry().path, "src/main.rs");
    assert_ne!(main.ino(), src.ino());

    let err = main.lookup("x").await.err().expect("files have no children");
    assert_eq!(err.os_error(), Some(libc::ENOTDIR));
}

#[rstest]
#[case("README.md", b"hello world".as_slice())]
#[case("empty.txt", b"".as_slice())]
#[tokio::test]
async fn test_open_and_read(provider: MockProvider, #[case] name: &str, #[case] expected: &[u8]) {
    let (provider, root) = mount(provider);
    let node = root.lookup(name).await.unwrap();

    node.open(libc::O_RDONLY).await.unwrap();
    let data = node.read(0, 4096).await.unwrap();
    assert_eq!(data.as_ref(), expected);

    node.open(libc::O_RDONLY).await.unwrap();
    assert_eq!(
        provider.file_calls.load(Ordering::SeqCst),
        1,
        "content should only be fetched once"
    );
}

#[rstest]
#[case(0, 5, b"hello".as_slice())]
#[case(6, 100, b"world".as_slice())]
#[case(11, 10, b"".as_slice())]
#[case(500, 10, b"".as_slice())]
#[tokio::test]
async fn test_read_ranges(
    provider: MockProvider,
    #[case] offset: i64,
    #[case] size: u32,
    #[case] expected: &[u8],
) {
    let (_provider, root) = mount(provider);
    let node = root.lookup("README.md").await.unwrap();
    node.open(libc::O_RDONLY).await.unwrap();
    assert_eq!(node.read(offset, size).await.unwrap().as_ref(), expected);
}

#[rstest]
#[tokio::test]
async fn test_open_failure_is_io_error(provider: MockProvider) {
    let (provider, root) = mount(provider);
    let node = root.lookup("README.md").await.unwrap();
    provider.fail_next(1);

    let err = node.open(libc::O_RDONLY).await.unwrap_err();
    assert_eq!(err.os_error(), Some(libc::EIO));
    node.open(libc::O_RDONLY).await.expect("open should be retried");
}

#[rstest]
#[tokio::test]
async fn test_open_directory(provider: MockProvider) {
    let (_provider, root) = mount(provider);
    let err = root.open(libc::O_RDONLY).await.unwrap_err();
    assert_eq!(err.os_error(), Some(libc::EISDIR));
}

#[rstest]
#[tokio::test]
async fn test_symlink(provider: MockProvider) {
    let (_provider, root) = mount(provider);
    let link = root.lookup("latest").await.unwrap();

    let attr = link.attr();
    assert_eq!(attr.kind, FileType::Symlink);
    assert_eq!(attr.size, "src/main.rs".len() as u64);
    assert_eq!(link.readlink().unwrap(), b"src/main.rs");

    let file = root.lookup("README.md").await.unwrap();
    assert_eq!(file.readlink().unwrap_err().os_error(), Some(libc::EINVAL));
}

#[rstest]
#[tokio::test]
async fn test_attributes(provider: MockProvider) {
    let (_provider, root) = mount(provider);

    let attr = root.attr();
    assert_eq!(attr.ino, ROOT_INODE);
    assert_eq!(attr.kind, FileType::Directory);
    assert_eq!(attr.perm, 0o777);
    assert_eq!(attr.nlink, 2);

    let cargo = root.lookup("Cargo.toml").await.unwrap().attr();
    assert_eq!(cargo.size, 5000);
    assert_eq!(cargo.blocks, 16);
    assert_eq!(cargo.blksize, 4096);

    let empty = root.lookup("empty.txt").await.unwrap().attr();
    assert_eq!(empty.blocks, 0);
}

#[rstest]
#[tokio::test]
async fn test_xattr_and_statfs(provider: MockProvider) {
    let (_provider, root) = mount(provider);
    let node = root.lookup("README.md").await.unwrap();

    let err = node.getxattr("user.comment").unwrap_err();
    assert_eq!(err.os_error(), Some(libc::ENODATA));
    assert!(node.listxattr().is_empty());

    let stats = root.statfs();
    assert_eq!(stats.blocks, 0);
    assert_eq!(stats.files, 0);
    assert_eq!(stats.block_size, 4096);
    assert_eq!(stats.name_len, u32::MAX);
}
