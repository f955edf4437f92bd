pub mod boot_dir;
