pub mod server;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        issuer_url: String,
        verification_key: Option<String>,
    },
}
