// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use taintdist::loader::{
    InputPaths, BLOCK_FUNCTION_FILE, BLOCK_LINES_FILE, CALL_ARGS_FILE, DEF_USE_FILE,
    FUNCTION_ENTRY_FILE, FUNCTION_PARAMS_FILE,
};

// Facts of:
//
//  7 void func() {
//  8   printf("This is a func.\n");
//  9 }
// 11 void func1(int p) {
// 12   int v1 = p;
// 13   int v2 = 3;
// 14   v1 = v1 + v2;
// 15 }
// 17 void func2(int p1, int p2) {
// 18   int v1 = p1 + 1;
// 19   int v2 = p2 + 2;
// 20 }
// 22 int main(int argc, char **argv) {
// 23   int a = 1, b = 2, c = 3;
// 24   int d = 4, e = 5, f = 6;
// 25   a = b + c;
// 26   d = e + f;
// 28   if (a) {
// 29     b = 20;
// 30   } else {
// 31     b = -20;
// 32   }
// 34   if (d) {
// 35     f = 10;
// 36   } else {
// 37     f = -10;
// 38   }
// 40   func();
// 41   func1(a);
// 42   func2(b, f);
// 43   return 0;
// 44 }
const DEF_USE: &str = r#"{
    "test.c:12": { "def": ["v1"], "use": ["p"] },
    "test.c:13": { "def": ["v2"] },
    "test.c:14": { "def": ["v1"], "use": ["v1", "v2"] },
    "test.c:18": { "def": ["v1"], "use": ["p1"] },
    "test.c:19": { "def": ["v2"], "use": ["p2"] },
    "test.c:23": { "def": ["a", "b", "c"] },
    "test.c:24": { "def": ["d", "e", "f"] },
    "test.c:25": { "def": ["a"], "use": ["b", "c"] },
    "test.c:26": { "def": ["d"], "use": ["e", "f"] },
    "test.c:28": { "use": ["a"] },
    "test.c:29": { "def": ["b"] },
    "test.c:31": { "def": ["b"] },
    "test.c:34": { "use": ["d"] },
    "test.c:35": { "def": ["f"] },
    "test.c:37": { "def": ["f"] },
    "test.c:41": { "use": ["a"] },
    "test.c:42": { "use": ["b", "f"] }
}"#;

const BLOCK_LINES: &str = r#"{
    "test.c:7": ["test.c:7", "test.c:8", "test.c:9"],
    "test.c:11": ["test.c:11", "test.c:12", "test.c:13", "test.c:14", "test.c:15"],
    "test.c:17": ["test.c:17", "test.c:18", "test.c:19", "test.c:20"],
    "test.c:22": ["test.c:22", "test.c:23", "test.c:24", "test.c:25", "test.c:26", "test.c:28"],
    "test.c:29": ["test.c:29"],
    "test.c:31": ["test.c:31"],
    "test.c:34": ["test.c:34"],
    "test.c:35": ["test.c:35"],
    "test.c:37": ["test.c:37"],
    "test.c:40": ["test.c:40", "test.c:41", "test.c:42", "test.c:43"]
}"#;

const BLOCK_FUNCTION: &str = r#"{
    "test.c:7": "func",
    "test.c:11": "func1",
    "test.c:17": "func2",
    "test.c:22": "main",
    "test.c:29": "main",
    "test.c:31": "main",
    "test.c:34": "main",
    "test.c:35": "main",
    "test.c:37": "main",
    "test.c:40": "main"
}"#;

const FUNCTION_ENTRY: &str = r#"{
    "func": "test.c:7",
    "func1": "test.c:11",
    "func2": "test.c:17",
    "main": "test.c:22"
}"#;

const FUNCTION_PARAMS: &str = r#"{
    "func": [],
    "func1": ["p"],
    "func2": ["p1", "p2"],
    "main": ["argc", "argv"]
}"#;

const CALL_ARGS: &str = r#"{
    "test.c:40": { "func": [] },
    "test.c:41": { "func1": [["a"]] },
    "test.c:42": { "func2": [["b"], ["f"]] }
}"#;

/// (function, blocks, edges by block index)
fn cfgs() -> Vec<(&'static str, Vec<&'static str>, Vec<(usize, usize)>)> {
    vec![
        ("func", vec!["test.c:7"], vec![]),
        ("func1", vec!["test.c:11"], vec![]),
        ("func2", vec!["test.c:17"], vec![]),
        (
            "main",
            vec![
                "test.c:22",
                "test.c:29",
                "test.c:31",
                "test.c:34",
                "test.c:35",
                "test.c:37",
                "test.c:40",
            ],
            vec![
                (0, 1),
                (0, 2),
                (1, 3),
                (2, 3),
                (3, 4),
                (3, 5),
                (4, 6),
                (5, 6),
            ],
        ),
    ]
}

/// Renders a CFG the way `opt -dot-cfg-only` does.
fn render_dot(function: &str, blocks: &[&str], edges: &[(usize, usize)]) -> String {
    let mut out = format!(
        "digraph \"CFG for '{0}' function\" {{\n\tlabel=\"CFG for '{0}' function\";\n\n",
        function
    );
    for (i, block) in blocks.iter().enumerate() {
        let succs: Vec<&(usize, usize)> = edges.iter().filter(|(f, _)| *f == i).collect();
        if succs.len() == 2 {
            out.push_str(&format!(
                "\tNode0x{:x} [shape=record,label=\"{{{}:|{{<s0>T|<s1>F}}}}\"];\n",
                0x1000 + i,
                block
            ));
            for (port, (_, t)) in succs.iter().enumerate() {
                out.push_str(&format!(
                    "\tNode0x{:x}:s{} -> Node0x{:x};\n",
                    0x1000 + i,
                    port,
                    0x1000 + t
                ));
            }
        } else {
            out.push_str(&format!(
                "\tNode0x{:x} [shape=record,label=\"{{{}:}}\"];\n",
                0x1000 + i,
                block
            ));
            for (_, t) in succs.iter() {
                out.push_str(&format!(
                    "\tNode0x{:x} -> Node0x{:x};\n",
                    0x1000 + i,
                    0x1000 + t
                ));
            }
        }
    }
    out.push_str("}\n");
    out
}

/// Writes facts, CFGs and [seeds] below [root].
pub fn write_test_program(root: &Path, seeds: &str) -> InputPaths {
    let facts = root.join("facts");
    let cfg_dir = root.join("cfg");
    fs::create_dir_all(&facts).unwrap();
    fs::create_dir_all(&cfg_dir).unwrap();

    fs::write(facts.join(DEF_USE_FILE), DEF_USE).unwrap();
    fs::write(facts.join(BLOCK_LINES_FILE), BLOCK_LINES).unwrap();
    fs::write(facts.join(BLOCK_FUNCTION_FILE), BLOCK_FUNCTION).unwrap();
    fs::write(facts.join(FUNCTION_ENTRY_FILE), FUNCTION_ENTRY).unwrap();
    fs::write(facts.join(FUNCTION_PARAMS_FILE), FUNCTION_PARAMS).unwrap();
    fs::write(facts.join(CALL_ARGS_FILE), CALL_ARGS).unwrap();

    for (function, blocks, edges) in cfgs() {
        fs::write(
            cfg_dir.join(format!("cfg.{}.dot", function)),
            render_dot(function, &blocks, &edges),
        )
        .unwrap();
    }

    let seed_file = root.join("seeds.txt");
    fs::write(&seed_file, seeds).unwrap();
    InputPaths::new(facts, cfg_dir, seed_file)
}

pub fn output_path(root: &Path) -> PathBuf {
    root.join("fitness.txt")
}

pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}
