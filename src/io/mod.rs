//! Filesystem boundary: LED map files and change detection.

pub mod directory_monitor;
pub mod led_csv;

pub use directory_monitor::DirectoryMonitor;
pub use led_csv::{
    is_observation_file, load_led_map_2d, load_led_map_3d, load_observation_maps,
    observation_files, write_led_map_3d,
};
