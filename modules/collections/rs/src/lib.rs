pub mod text_index;
