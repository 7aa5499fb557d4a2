// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use rstest::rstest;

use super::resume_index;

#[rstest]
#[case::start(0, 0)]
#[case::after_first(5, 1)]
#[case::mid_list(6, 2)]
#[case::after_last(9, 4)]
#[case::unknown_entry(42, 4)]
fn test_readdir_resume_index(#[case] offset: i64, #[case] expected: usize) {
    let inos = [5, 6, 7, 9];
    assert_eq!(resume_index(inos, offset), expected);
}

#[rstest]
fn test_readdir_resume_index_empty_dir() {
    assert_eq!(resume_index(std::iter::empty(), 0), 0);
    assert_eq!(resume_index(std::iter::empty(), 3), 0);
}
