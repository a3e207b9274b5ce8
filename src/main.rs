fn main() {
    acc_convert::cli::run();
}
