#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub issuer_url: String,
    pub verification_key_pem: Option<String>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(issuer_url: String) -> Self {
        Self {
            issuer_url,
            verification_key_pem: None,
        }
    }

    pub fn set_verification_key(&mut self, pem: String) {
        self.verification_key_pem = Some(pem);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_args() {
        let issuer = "https://identity.aula.dev".to_string();
        let mut args = GlobalArgs::new(issuer);
        assert_eq!(args.issuer_url, "https://identity.aula.dev");
        assert!(args.verification_key_pem.is_none());

        args.set_verification_key("-----BEGIN PUBLIC KEY-----".to_string());
        assert!(args.verification_key_pem.is_some());
    }
}
