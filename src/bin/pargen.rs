fn main() {
    pargen::cli::run();
}
