// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use crate::{
    cfg_store::{CfgStore, FunctionCfg},
    location::{var_set, DefUse, Location},
    program::{ProgramModel, ProgramModelBuilder},
};

pub const TEST_FILE: &str = "test.c";
pub const CHAIN_DEPTH: u32 = 120;

pub fn loc(line: u32) -> Location {
    Location::new(TEST_FILE, line)
}

/// Blocks are named after their first line.
pub fn bname(line: u32) -> String {
    loc(line).to_string()
}

pub fn locs(lines: &[u32]) -> Vec<Location> {
    lines.iter().map(|l| loc(*l)).collect()
}

pub fn du(def: &[&str], uses: &[&str]) -> DefUse {
    DefUse::new(def.iter().copied(), uses.iter().copied())
}

fn node_name(label: &str) -> String {
    format!("Node_{}", label.replace(['.', ':'], "_"))
}

/// A CFG whose nodes carry the given block labels.
pub fn build_cfg(function: &str, labels: &[String], edges: &[(u32, u32)]) -> FunctionCfg {
    let mut cfg = FunctionCfg::new(function);
    for l in labels.iter() {
        cfg.add_node(&node_name(l), Some(l.as_str()));
    }
    for (from, to) in edges.iter() {
        cfg.add_edge(&node_name(&bname(*from)), &node_name(&bname(*to)));
    }
    cfg
}

fn add_block(b: ProgramModelBuilder, function: &str, lines: &[u32]) -> ProgramModelBuilder {
    b.block(&bname(lines[0]), Some(function), locs(lines))
}

// main()
//   test.c:10, test.c:11
// Single block without any facts.
pub fn get_single_block_program() -> (ProgramModel, CfgStore) {
    let b = ProgramModel::builder().entry("main", &bname(10));
    let model = add_block(b, "main", &[10, 11]).build();
    let mut store = CfgStore::new();
    store.insert(build_cfg("main", &[bname(10)], &[]));
    (model, store)
}

// main()
//   B0: test.c:10  -> B1: test.c:20
//   test.c:11   x = y;
//   test.c:21   z = x;
pub fn get_two_block_program() -> (ProgramModel, CfgStore) {
    let mut b = ProgramModel::builder()
        .entry("main", &bname(10))
        .def_use(loc(11), du(&["x"], &["y"]))
        .def_use(loc(21), du(&["z"], &["x"]));
    b = add_block(b, "main", &[10, 11]);
    b = add_block(b, "main", &[20, 21]);
    let mut store = CfgStore::new();
    store.insert(build_cfg("main", &[bname(10), bname(20)], &[(10, 20)]));
    (b.build(), store)
}

// void func1(int x) {
//   F0: test.c:3
//   F1: test.c:5
//   test.c:6    r = x;
// }
// int main() {
//   M0: test.c:10
//   test.c:11   a = argc;
//   M1: test.c:12
//   test.c:12   y = a;
//   test.c:14   c = func1(y);
//   M3: test.c:16 (no facts)
// }
//
// main: M0 -> M1, M0 -> M3 -> M1
pub fn get_call_program() -> (ProgramModel, CfgStore) {
    let mut b = ProgramModel::builder()
        .entry("func1", &bname(3))
        .entry("main", &bname(10))
        .params("func1", vec!["x".to_owned()])
        .def_use(loc(6), du(&["r"], &["x"]))
        .def_use(loc(11), du(&["a"], &["argc"]))
        .def_use(loc(12), du(&["y"], &["a"]))
        .def_use(loc(14), du(&["c"], &["y"]))
        .call(loc(14), "func1", vec![var_set(["y"])]);
    b = add_block(b, "func1", &[3, 4]);
    b = add_block(b, "func1", &[5, 6]);
    b = add_block(b, "main", &[10, 11]);
    b = add_block(b, "main", &[12, 13, 14]);
    b = add_block(b, "main", &[16, 17]);
    let mut store = CfgStore::new();
    store.insert(build_cfg("func1", &[bname(3), bname(5)], &[(3, 5)]));
    store.insert(build_cfg(
        "main",
        &[bname(10), bname(12), bname(16)],
        &[(10, 12), (10, 16), (16, 12)],
    ));
    (b.build(), store)
}

// void func2(int p) {
//   G0: test.c:20
//   test.c:21   q = p;
// }
// int main() {
//   M0: test.c:10
//   test.c:10   a = 0;
//   test.c:11   func2(a);
//   M1: test.c:12
//   test.c:13   b = a;
// }
pub fn get_backward_call_program() -> (ProgramModel, CfgStore) {
    let mut b = ProgramModel::builder()
        .entry("func2", &bname(20))
        .entry("main", &bname(10))
        .params("func2", vec!["p".to_owned()])
        .def_use(loc(10), du(&["a"], &[]))
        .def_use(loc(13), du(&["b"], &["a"]))
        .def_use(loc(21), du(&["q"], &["p"]))
        .call(loc(11), "func2", vec![var_set(["a"])]);
    b = add_block(b, "func2", &[20, 21]);
    b = add_block(b, "main", &[10, 11]);
    b = add_block(b, "main", &[12, 13]);
    let mut store = CfgStore::new();
    store.insert(build_cfg("func2", &[bname(20)], &[]));
    store.insert(build_cfg("main", &[bname(10), bname(12)], &[(10, 12)]));
    (b.build(), store)
}

/// Entry block of chain function `f<i>`.
pub fn chain_entry(i: u32) -> String {
    bname(10 * i + 1)
}

/// Second block of chain function `f<i>`. It holds the call of `f<i-1>`.
pub fn chain_block(i: u32) -> String {
    bname(10 * i + 2)
}

// f<i>(p) {
//   E: test.c:<10i+1>
//   C: test.c:<10i+2>
//   test.c:<10i+3>   f<i-1>(p);
// }
//
// f0 is called by f1, f1 by f2 and so on. Every hop adds one to the offset.
pub fn get_call_chain_program() -> (ProgramModel, CfgStore) {
    let mut b = ProgramModel::builder();
    let mut store = CfgStore::new();
    for i in 0..=CHAIN_DEPTH {
        let f = format!("f{}", i);
        let e = 10 * i + 1;
        let c = 10 * i + 2;
        b = b
            .entry(&f, &chain_entry(i))
            .params(&f, vec!["p".to_owned()])
            .def_use(loc(c + 1), du(&[], &["p"]));
        b = add_block(b, &f, &[e]);
        b = add_block(b, &f, &[c, c + 1]);
        if i > 0 {
            b = b.call(loc(c + 1), &format!("f{}", i - 1), vec![var_set(["p"])]);
        }
        store.insert(build_cfg(&f, &[chain_entry(i), chain_block(i)], &[(e, c)]));
    }
    (b.build(), store)
}

// void f(int n) {
//   R0: test.c:30
//   R1: test.c:32
//   test.c:33   f(n);
// }
// R0 -> R1 -> R0
pub fn get_recursive_program() -> (ProgramModel, CfgStore) {
    let mut b = ProgramModel::builder()
        .entry("f", &bname(30))
        .params("f", vec!["n".to_owned()])
        .def_use(loc(33), du(&[], &["n"]))
        .call(loc(33), "f", vec![var_set(["n"])]);
    b = add_block(b, "f", &[30, 31]);
    b = add_block(b, "f", &[32, 33]);
    let mut store = CfgStore::new();
    store.insert(build_cfg("f", &[bname(30), bname(32)], &[(30, 32), (32, 30)]));
    (b.build(), store)
}

// main()
//   U0: test.c:40
//   test.c:41   arr[i] = i;
//   U1: test.c:42
//   test.c:43   v = w;
//   U2: test.c:44
//   test.c:45   r = v;
// U0 -> U2, U1 -> U2
pub fn get_unresolvable_program() -> (ProgramModel, CfgStore) {
    let mut b = ProgramModel::builder()
        .entry("main", &bname(40))
        .def_use(loc(41), du(&["arr[i]"], &["i"]))
        .def_use(loc(43), du(&["v"], &["w"]))
        .def_use(loc(45), du(&["r"], &["v"]));
    b = add_block(b, "main", &[40, 41]);
    b = add_block(b, "main", &[42, 43]);
    b = add_block(b, "main", &[44, 45]);
    let mut store = CfgStore::new();
    store.insert(build_cfg(
        "main",
        &[bname(40), bname(42), bname(44)],
        &[(40, 44), (42, 44)],
    ));
    (b.build(), store)
}

// main()
//   P0: test.c:10
//   test.c:11   x = y;
//   P1: test.c:20
//   test.c:21   w = v;
//   P2: test.c:30
//   test.c:31   z = x;
// P0 -> P1 -> P2
// P1 neither defines nor uses x.
pub fn get_pass_through_program() -> (ProgramModel, CfgStore) {
    let mut b = ProgramModel::builder()
        .entry("main", &bname(10))
        .def_use(loc(11), du(&["x"], &["y"]))
        .def_use(loc(21), du(&["w"], &["v"]))
        .def_use(loc(31), du(&["z"], &["x"]));
    b = add_block(b, "main", &[10, 11]);
    b = add_block(b, "main", &[20, 21]);
    b = add_block(b, "main", &[30, 31]);
    let mut store = CfgStore::new();
    store.insert(build_cfg(
        "main",
        &[bname(10), bname(20), bname(30)],
        &[(10, 20), (20, 30)],
    ));
    (b.build(), store)
}

// void f(int p) {
//   E0: test.c:3
//   test.c:3    r = p;
//   E1: test.c:5
//   test.c:5    s = r;
// }
// int main() {
//   M0: test.c:10
//   test.c:10   a = 0;
//   test.c:11   f(a);
// }
pub fn get_callee_entry_program() -> (ProgramModel, CfgStore) {
    let mut b = ProgramModel::builder()
        .entry("f", &bname(3))
        .entry("main", &bname(10))
        .params("f", vec!["p".to_owned()])
        .def_use(loc(3), du(&["r"], &["p"]))
        .def_use(loc(5), du(&["s"], &["r"]))
        .def_use(loc(10), du(&["a"], &[]))
        .call(loc(11), "f", vec![var_set(["a"])]);
    b = add_block(b, "f", &[3, 4]);
    b = add_block(b, "f", &[5]);
    b = add_block(b, "main", &[10, 11]);
    let mut store = CfgStore::new();
    store.insert(build_cfg("f", &[bname(3), bname(5)], &[(3, 5)]));
    store.insert(build_cfg("main", &[bname(10)], &[]));
    (b.build(), store)
}
