//! 拓扑生成器

pub mod fat_tree;
pub mod two_tier;
