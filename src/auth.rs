use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Portal roles. ADMIN and TEACHER are verified against their own tables;
/// STUDENT and PARENT both resolve against the student registry and only
/// differ in the role tag attached to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Parent,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(Self::Admin),
            "TEACHER" => Some(Self::Teacher),
            "STUDENT" => Some(Self::Student),
            "PARENT" => Some(Self::Parent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Teacher => "TEACHER",
            Self::Student => "STUDENT",
            Self::Parent => "PARENT",
        }
    }
}

/// The logged-in user held in AppState between requests.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub role: Role,
    pub id: String,
    pub name: String,
    /// Teacher assignment, used for section-scoped authorization.
    pub assigned_class: Option<String>,
    pub section: Option<String>,
    /// Student placement, used for class-targeted reads (exam events).
    pub class: Option<String>,
    /// Full record echoed back by session.current.
    pub profile: serde_json::Value,
}

/// Typed login failures; the handler maps these onto wire error codes.
#[derive(Debug)]
pub enum LoginError {
    /// Admin email/password rejected.
    AuthenticationFailed,
    /// Teacher staff-id/pin rejected (deliberately not distinguishing which).
    InvalidCredentials,
    /// Student/parent triple matched no record.
    RecordNotFound,
    /// Matched a blocked student. Must surface differently from not-found.
    AccessRestricted,
    /// The store itself failed.
    Unavailable(String),
}

impl LoginError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::InvalidCredentials => "invalid_credentials",
            Self::RecordNotFound => "record_not_found",
            Self::AccessRestricted => "access_restricted",
            Self::Unavailable(_) => "service_unavailable",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::AuthenticationFailed => "admin authentication failed".to_string(),
            Self::InvalidCredentials => "invalid staff id or security pin".to_string(),
            Self::RecordNotFound => "record not found; double check your info".to_string(),
            Self::AccessRestricted => {
                "portal access has been restricted by the administration; contact office"
                    .to_string()
            }
            Self::Unavailable(e) => e.clone(),
        }
    }
}

fn unavailable(e: rusqlite::Error) -> LoginError {
    LoginError::Unavailable(e.to_string())
}

pub fn new_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Salted SHA-256 digest, hex-encoded. The original compared pins in
/// plaintext; that is not reproduced here.
pub fn hash_secret(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn verify_secret(salt: &str, secret: &str, expected_hash: &str) -> bool {
    hash_secret(salt, secret) == expected_hash
}

pub fn admin_count(conn: &Connection) -> anyhow::Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM admins", [], |r| r.get(0))?)
}

pub fn login_admin(
    conn: &Connection,
    email: &str,
    password: &str,
) -> Result<SessionUser, LoginError> {
    let row: Option<(String, String, String, String)> = conn
        .query_row(
            "SELECT id, email, pass_hash, pass_salt FROM admins WHERE email = ? LIMIT 1",
            [email.trim()],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()
        .map_err(unavailable)?;

    let Some((id, stored_email, pass_hash, pass_salt)) = row else {
        return Err(LoginError::AuthenticationFailed);
    };
    if !verify_secret(&pass_salt, password, &pass_hash) {
        return Err(LoginError::AuthenticationFailed);
    }

    Ok(SessionUser {
        role: Role::Admin,
        id: id.clone(),
        name: stored_email.clone(),
        assigned_class: None,
        section: None,
        class: None,
        profile: json!({
            "role": Role::Admin.as_str(),
            "uid": id,
            "email": stored_email
        }),
    })
}

pub fn login_teacher(
    conn: &Connection,
    staff_id: &str,
    pin: &str,
) -> Result<SessionUser, LoginError> {
    let normalized = staff_id.trim().to_uppercase();
    let row = conn
        .query_row(
            "SELECT id, name, staff_id, pin_hash, pin_salt,
                    assigned_class, section, section_category, teacher_role
             FROM teachers WHERE staff_id = ? LIMIT 1",
            [&normalized],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, String>(6)?,
                    r.get::<_, String>(7)?,
                    r.get::<_, String>(8)?,
                ))
            },
        )
        .optional()
        .map_err(unavailable)?;

    let Some((id, name, staff_id, pin_hash, pin_salt, assigned_class, section, category, t_role)) =
        row
    else {
        return Err(LoginError::InvalidCredentials);
    };
    if !verify_secret(&pin_salt, pin, &pin_hash) {
        return Err(LoginError::InvalidCredentials);
    }

    Ok(SessionUser {
        role: Role::Teacher,
        id: id.clone(),
        name: name.clone(),
        assigned_class: Some(assigned_class.clone()),
        section: Some(section.clone()),
        class: None,
        profile: json!({
            "role": Role::Teacher.as_str(),
            "id": id,
            "name": name,
            "staffId": staff_id,
            "assignedClass": assigned_class,
            "section": section,
            "sectionCategory": category,
            "teacherRole": t_role
        }),
    })
}

/// STUDENT and PARENT share the verification triple; the chosen role does not
/// change the query, only the tag on the resulting session.
pub fn login_student(
    conn: &Connection,
    role: Role,
    aadhaar: &str,
    dob: &str,
    roll_no: &str,
) -> Result<SessionUser, LoginError> {
    let row = conn
        .query_row(
            "SELECT id, name, aadhaar, dob, roll_no, class, section, is_blocked
             FROM students WHERE aadhaar = ? AND dob = ? AND roll_no = ? LIMIT 1",
            [aadhaar.trim(), dob.trim(), roll_no.trim()],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, String>(6)?,
                    r.get::<_, i64>(7)? != 0,
                ))
            },
        )
        .optional()
        .map_err(unavailable)?;

    let Some((id, name, aadhaar, dob, roll_no, class, section, is_blocked)) = row else {
        return Err(LoginError::RecordNotFound);
    };
    if is_blocked {
        return Err(LoginError::AccessRestricted);
    }

    Ok(SessionUser {
        role,
        id: id.clone(),
        name: name.clone(),
        assigned_class: None,
        section: Some(section.clone()),
        class: Some(class.clone()),
        profile: json!({
            "role": role.as_str(),
            "id": id,
            "name": name,
            "aadhaar": aadhaar,
            "dob": dob,
            "rollNo": roll_no,
            "class": class,
            "section": section
        }),
    })
}

/// Everything a caller may attempt, carrying its target scope. Handlers run
/// exactly one authorize() call at the boundary instead of sprinkling role
/// checks through the code.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Enroll/update/block/delete a student of the given (class, section).
    ManageSection { class: String, section: String },
    ManageStaff,
    ManageSettings,
    Broadcast,
    ManageExams,
    ManageBackups,
}

pub fn authorize(user: &SessionUser, op: &Operation) -> Result<(), String> {
    match user.role {
        Role::Admin => Ok(()),
        Role::Teacher => match op {
            Operation::ManageSection { class, section } => {
                let assigned = user.assigned_class.as_deref() == Some(class.as_str())
                    && user.section.as_deref() == Some(section.as_str());
                if assigned {
                    Ok(())
                } else {
                    Err(format!(
                        "teachers may only manage their assigned section, not {}-{}",
                        class, section
                    ))
                }
            }
            _ => Err("operation requires administrator access".to_string()),
        },
        Role::Student | Role::Parent => Err("operation not permitted for this role".to_string()),
    }
}
