pub mod plugin_view;
