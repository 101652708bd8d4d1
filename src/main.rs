fn main() {
    stasis_lib::run()
}
