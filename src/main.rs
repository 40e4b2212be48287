fn main() {
    story_viewer_lib::run()
}
