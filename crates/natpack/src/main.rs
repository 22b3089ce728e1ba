fn main() {
    std::process::exit(natpack::run());
}
