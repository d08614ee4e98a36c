fn main() {
    northwind_dashboard_lib::run()
}
