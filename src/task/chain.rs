// src/task/chain.rs

//! Graph wiring operators.
//!
//! `a >> b` registers `b` as a successor of `a` and returns `b`, so
//! `a >> b >> c` builds a chain. `a << b` registers `b` as an upstream of
//! `a` and returns `a`. Both forms also accept `Vec<Task>` on either side:
//! `vec![a, b] >> c` adds two edges.
//!
//! Task handles are cheap clones, so the by-value operand signatures of
//! `std::ops` cost nothing; wiring mutates the shared nodes.

use std::ops::{Shl, Shr};

use super::Task;

impl Shr<Task> for Task {
    type Output = Task;

    fn shr(self, rhs: Task) -> Task {
        self.add_successor(&rhs);
        rhs
    }
}

impl Shr<Vec<Task>> for Task {
    type Output = Vec<Task>;

    fn shr(self, rhs: Vec<Task>) -> Vec<Task> {
        for task in &rhs {
            self.add_successor(task);
        }
        rhs
    }
}

impl Shr<Task> for Vec<Task> {
    type Output = Task;

    fn shr(self, rhs: Task) -> Task {
        for task in &self {
            task.add_successor(&rhs);
        }
        rhs
    }
}

impl Shl<Task> for Task {
    type Output = Task;

    fn shl(self, rhs: Task) -> Task {
        self.add_upstream(&rhs);
        self
    }
}

impl Shl<Vec<Task>> for Task {
    type Output = Task;

    fn shl(self, rhs: Vec<Task>) -> Task {
        for task in &rhs {
            self.add_upstream(task);
        }
        self
    }
}

impl Shl<Task> for Vec<Task> {
    type Output = Vec<Task>;

    fn shl(self, rhs: Task) -> Vec<Task> {
        for task in &self {
            task.add_upstream(&rhs);
        }
        self
    }
}
