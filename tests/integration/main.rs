#![allow(dead_code)]

mod store;
mod submission;
