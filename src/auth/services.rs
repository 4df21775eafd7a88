use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{AuthResponse, PublicUser, RegisterRequest};
use super::jwt::JwtKeys;
use super::password::MIN_PASSWORD_LEN;
use super::repo_types::User;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

/// Registration is limited to one institution; `domain` is compared exactly,
/// so subdomains do not qualify.
pub(crate) fn is_institutional_email(email: &str, domain: &str) -> bool {
    is_valid_email(email)
        && email
            .rsplit_once('@')
            .is_some_and(|(_, d)| d.eq_ignore_ascii_case(domain))
}

/// Normalizes the request in place and returns the first validation failure.
pub(crate) fn validate_registration(
    req: &mut RegisterRequest,
    domain: &str,
) -> Result<(), &'static str> {
    req.email = req.email.trim().to_lowercase();
    req.name = req.name.trim().to_string();

    if !is_valid_email(&req.email) {
        return Err("Invalid email");
    }
    if !is_institutional_email(&req.email, domain) {
        return Err("Email must belong to the institutional domain");
    }
    if req.name.is_empty() {
        return Err("Name is required");
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err("Password too short");
    }
    if req.password != req.password_confirm {
        return Err("Passwords do not match");
    }
    Ok(())
}

pub(crate) fn issue_tokens(keys: &JwtKeys, user: User) -> anyhow::Result<AuthResponse> {
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            name: " Ana ".into(),
            password: password.into(),
            password_confirm: confirm.into(),
        }
    }

    #[test]
    fn institutional_domain_is_exact() {
        assert!(is_institutional_email("ana@usc.edu.co", "usc.edu.co"));
        assert!(is_institutional_email("ana@USC.edu.co", "usc.edu.co"));
        assert!(!is_institutional_email("ana@gmail.com", "usc.edu.co"));
        assert!(!is_institutional_email("ana@mail.usc.edu.co", "usc.edu.co"));
        assert!(!is_institutional_email("ana@usc.edu.co.evil.com", "usc.edu.co"));
        assert!(!is_institutional_email("usc.edu.co", "usc.edu.co"));
    }

    #[test]
    fn registration_normalizes_and_accepts() {
        let mut req = request("  Ana@USC.edu.co ", "secreto", "secreto");
        assert_eq!(validate_registration(&mut req, "usc.edu.co"), Ok(()));
        assert_eq!(req.email, "ana@usc.edu.co");
        assert_eq!(req.name, "Ana");
    }

    #[test]
    fn registration_rejections() {
        let cases = [
            (request("not-an-email", "secreto", "secreto"), "Invalid email"),
            (
                request("ana@gmail.com", "secreto", "secreto"),
                "Email must belong to the institutional domain",
            ),
            (request("ana@usc.edu.co", "12345", "12345"), "Password too short"),
            (
                request("ana@usc.edu.co", "secreto", "secretos"),
                "Passwords do not match",
            ),
        ];
        for (mut req, expected) in cases {
            assert_eq!(validate_registration(&mut req, "usc.edu.co"), Err(expected));
        }

        let mut nameless = request("ana@usc.edu.co", "secreto", "secreto");
        nameless.name = "   ".into();
        assert_eq!(
            validate_registration(&mut nameless, "usc.edu.co"),
            Err("Name is required")
        );
    }
}
