pub mod remove_bg_client;
