//! Member repository contracts and SQLite implementation.

use crate::model::member::{Member, MemberId, MemberStatus};
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const MEMBER_SELECT_SQL: &str = "SELECT
    id,
    name,
    email,
    phone,
    address,
    city,
    state,
    zip_code,
    membership_date,
    status
FROM members";

/// Repository interface for member records.
pub trait MemberRepository {
    fn create_member(&self, member: &Member) -> RepoResult<MemberId>;
    fn get_member(&self, id: MemberId) -> RepoResult<Option<Member>>;
    /// All members in store order.
    fn list_members(&self) -> RepoResult<Vec<Member>>;
}

/// SQLite-backed member repository.
pub struct SqliteMemberRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMemberRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl MemberRepository for SqliteMemberRepository<'_> {
    fn create_member(&self, member: &Member) -> RepoResult<MemberId> {
        member.validate()?;

        self.conn.execute(
            "INSERT INTO members (
                id,
                name,
                email,
                phone,
                address,
                city,
                state,
                zip_code,
                membership_date,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                member.id.to_string(),
                member.name.as_str(),
                member.email.as_deref(),
                member.phone.as_deref(),
                member.address.as_deref(),
                member.city.as_deref(),
                member.state.as_deref(),
                member.zip_code.as_deref(),
                member.membership_date,
                member.status.as_str(),
            ],
        )?;

        Ok(member.id)
    }

    fn get_member(&self, id: MemberId) -> RepoResult<Option<Member>> {
        load_member(self.conn, id)
    }

    fn list_members(&self) -> RepoResult<Vec<Member>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEMBER_SELECT_SQL} ORDER BY seq ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_member_row(row)?);
        }
        Ok(members)
    }
}

pub(crate) fn load_member(conn: &Connection, id: MemberId) -> RepoResult<Option<Member>> {
    let mut stmt = conn.prepare(&format!("{MEMBER_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_member_row(row)?));
    }
    Ok(None)
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<Member> {
    let id_text: String = row.get("id")?;
    let status_text: String = row.get("status")?;
    let status = MemberStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid member status `{status_text}` in members.status"))
    })?;

    let member = Member {
        id: parse_uuid(&id_text, "members.id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        address: row.get("address")?,
        city: row.get("city")?,
        state: row.get("state")?,
        zip_code: row.get("zip_code")?,
        membership_date: row.get("membership_date")?,
        status,
    };
    member
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("member {id_text}: {err}")))?;
    Ok(member)
}
