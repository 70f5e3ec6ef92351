pub mod test_case;
pub mod work_item;
