// linkshelf managers
// The bookmark view and the state it reconciles.

pub mod bookmark_list;
pub mod bookmark_view;
pub mod change_listener;
