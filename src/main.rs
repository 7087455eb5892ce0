fn main() {
    std::process::exit(sdp_guard::run().code());
}
