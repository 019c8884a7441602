fn main() {
    // Exposes GIT_COMMIT_HASH and package metadata via OUT_DIR/built.rs.
    built::write_built_file().expect("Failed to acquire build-time information");
}
