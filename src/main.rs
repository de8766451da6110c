// Thin delegating binary.
//
// The server assembly lives in the `link-server` crate.
#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    link_server::run().await
}
