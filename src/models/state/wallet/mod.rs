pub mod change_policy;
pub mod keystore;
pub mod sprout_tree_view;
