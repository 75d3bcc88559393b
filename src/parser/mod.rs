mod edge_list;

pub use edge_list::{EdgeList, ParseWarning, parse_edge_list};
