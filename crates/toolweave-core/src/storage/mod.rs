pub mod flag_store;
