pub(crate) mod test_helpers;
