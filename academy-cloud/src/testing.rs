//! In-memory store and provider fakes for service and router tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use shared::error::{AppError, ErrorCode};
use shared::models::{
    Chapter, ChapterInput, ChapterOutline, Course, CourseInput, CourseLevel, CourseStatus,
    Enrollment, EnrollmentDayCount, EnrollmentStatus, Lesson, LessonInput, LessonProgress,
    PositionAssignment, User, UserRole,
};
use shared::util::{day_start_millis, new_id, now_millis};

use crate::auth::{
    ClientInfo, Decision, RateLimiter, Shield, ShieldRule, UserIdentity, UserStore,
};
use crate::error::{BoxError, ServiceError, ServiceResult};
use crate::services::assets::AssetJanitor;
use crate::services::catalog::CourseStore;
use crate::services::enrollment::{EnrollmentStore, PendingCheckout, WebhookEvents};
use crate::services::ledger::{PositionLedger, SiblingGroup, validate_assignments};
use crate::services::progress::ProgressStore;
use crate::services::structure::StructureStore;
use crate::state::AppState;
use crate::storage::{ObjectStore, public_object_url};
use crate::stripe::{CheckoutSession, CheckoutSessionRequest, PaymentProvider, ProductRequest};

// ── Identities and payloads ──

pub fn admin() -> UserIdentity {
    UserIdentity {
        user_id: "u-admin".into(),
        email: "admin@example.com".into(),
        name: "Admin".into(),
        role: UserRole::Admin,
    }
}

pub fn learner() -> UserIdentity {
    UserIdentity {
        user_id: "u-learner".into(),
        email: "ada@example.com".into(),
        name: "Ada".into(),
        role: UserRole::User,
    }
}

pub fn course_input(slug: &str) -> CourseInput {
    CourseInput {
        title: "Intro to JS".into(),
        slug: slug.into(),
        description: "Learn the language of the web".into(),
        small_description: "JavaScript from scratch".into(),
        file_key: "abc-cover.png".into(),
        price: 49,
        duration: 12,
        level: CourseLevel::Beginner,
        category: "Development".into(),
        status: CourseStatus::Published,
    }
}

// ── Memory store ──

#[derive(Default)]
struct Data {
    users: HashMap<String, User>,
    courses: HashMap<String, Course>,
    chapters: HashMap<String, Chapter>,
    lessons: HashMap<String, Lesson>,
    /// by enrollment ID
    enrollments: HashMap<String, Enrollment>,
    /// by (user ID, lesson ID)
    progress: HashMap<(String, String), LessonProgress>,
    events: HashSet<String>,
}

impl Data {
    fn chapters_of(&self, course_id: &str) -> Vec<Chapter> {
        let mut out: Vec<Chapter> = self
            .chapters
            .values()
            .filter(|c| c.course_id == course_id)
            .cloned()
            .collect();
        out.sort_by_key(|c| c.position);
        out
    }

    fn lessons_of(&self, chapter_id: &str) -> Vec<Lesson> {
        let mut out: Vec<Lesson> = self
            .lessons
            .values()
            .filter(|l| l.chapter_id == chapter_id)
            .cloned()
            .collect();
        out.sort_by_key(|l| l.position);
        out
    }

    fn enrollment_of(&self, user_id: &str, course_id: &str) -> Option<&Enrollment> {
        self.enrollments
            .values()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
    }

    fn renumber_chapters(&mut self, course_id: &str) {
        let ids: Vec<String> = self.chapters_of(course_id).into_iter().map(|c| c.id).collect();
        for (i, id) in ids.iter().enumerate() {
            if let Some(c) = self.chapters.get_mut(id) {
                c.position = i as i32 + 1;
            }
        }
    }

    fn renumber_lessons(&mut self, chapter_id: &str) {
        let ids: Vec<String> = self.lessons_of(chapter_id).into_iter().map(|l| l.id).collect();
        for (i, id) in ids.iter().enumerate() {
            if let Some(l) = self.lessons.get_mut(id) {
                l.position = i as i32 + 1;
            }
        }
    }

    /// Remove a lesson with its progress rows; returns the removed lesson
    fn remove_lesson(&mut self, lesson_id: &str) -> Option<Lesson> {
        let lesson = self.lessons.remove(lesson_id)?;
        self.progress.retain(|(_, l), _| l != lesson_id);
        Some(lesson)
    }

    /// Remove a chapter with its lessons; returns their asset keys
    fn remove_chapter(&mut self, chapter_id: &str) -> Option<Vec<String>> {
        self.chapters.remove(chapter_id)?;
        let mut keys = Vec::new();
        for lesson in self.lessons_of(chapter_id) {
            if let Some(removed) = self.remove_lesson(&lesson.id) {
                keys.extend(removed.asset_keys());
            }
        }
        Some(keys)
    }

    fn members(&self, group: &SiblingGroup) -> Option<Vec<String>> {
        match group {
            SiblingGroup::Chapters { course_id } => {
                self.courses.contains_key(course_id).then(|| {
                    self.chapters_of(course_id).into_iter().map(|c| c.id).collect()
                })
            }
            SiblingGroup::Lessons { chapter_id } => {
                self.chapters.contains_key(chapter_id).then(|| {
                    self.lessons_of(chapter_id).into_iter().map(|l| l.id).collect()
                })
            }
        }
    }
}

/// `Store` over in-process maps with switchable write failures
#[derive(Default)]
pub struct MemoryStore {
    data: Arc<Mutex<Data>>,
    fail_writes: AtomicBool,
    fail_commits: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail like a lost database connection
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make checkout commits fail; the staged enrollment is discarded as a dropped transaction would be
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn writable(&self) -> ServiceResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ServiceError::Db("connection reset by peer".into()));
        }
        Ok(())
    }

    fn data(&self) -> std::sync::MutexGuard<'_, Data> {
        self.data.lock().unwrap()
    }

    pub fn lesson_positions(&self, chapter_id: &str) -> Vec<(String, i32)> {
        self.data()
            .lessons_of(chapter_id)
            .into_iter()
            .map(|l| (l.id, l.position))
            .collect()
    }

    pub fn chapter_positions(&self, course_id: &str) -> Vec<i32> {
        self.data()
            .chapters_of(course_id)
            .into_iter()
            .map(|c| c.position)
            .collect()
    }

    pub fn enrollments_of(&self, user_id: &str) -> Vec<Enrollment> {
        let mut out: Vec<Enrollment> = self
            .data()
            .enrollments
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    /// Published course with price ID `price_{slug}` and no chapters
    pub fn seed_course(&self, slug: &str) -> String {
        self.insert_course_row(slug, &format!("{slug}-cover.png"), &format!("price_{slug}"))
    }

    fn insert_course_row(&self, slug: &str, file_key: &str, price_id: &str) -> String {
        let now = now_millis();
        let course = Course {
            id: new_id(),
            title: format!("Course {slug}"),
            slug: slug.to_string(),
            description: "Seeded course".into(),
            small_description: "Seeded course".into(),
            file_key: file_key.to_string(),
            price: 49,
            duration: 10,
            level: CourseLevel::Beginner,
            category: "Development".into(),
            status: CourseStatus::Published,
            stripe_price_id: Some(price_id.to_string()),
            user_id: admin().user_id,
            created_at: now,
            updated_at: now,
        };
        let id = course.id.clone();
        self.data().courses.insert(id.clone(), course);
        id
    }

    pub fn set_course_status(&self, course_id: &str, status: CourseStatus) {
        if let Some(c) = self.data().courses.get_mut(course_id) {
            c.status = status;
        }
    }

    fn seed_chapter(&self, course_id: &str, title: &str, position: i32) -> String {
        let now = now_millis();
        let chapter = Chapter {
            id: new_id(),
            course_id: course_id.to_string(),
            title: title.to_string(),
            position,
            created_at: now,
            updated_at: now,
        };
        let id = chapter.id.clone();
        self.data().chapters.insert(id.clone(), chapter);
        id
    }

    fn seed_lesson(&self, chapter_id: &str, title: &str, position: i32, video: Option<&str>) -> String {
        let now = now_millis();
        let lesson = Lesson {
            id: new_id(),
            chapter_id: chapter_id.to_string(),
            title: title.to_string(),
            description: None,
            position,
            video_key: video.map(String::from),
            thumbnail_key: None,
            created_at: now,
            updated_at: now,
        };
        let id = lesson.id.clone();
        self.data().lessons.insert(id.clone(), lesson);
        id
    }

    /// User row plus an Active enrollment, as after a confirmed payment
    pub fn activate(&self, identity: &UserIdentity, course_id: &str) {
        let now = now_millis();
        let mut data = self.data();
        data.users.entry(identity.user_id.clone()).or_insert_with(|| User {
            id: identity.user_id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: identity.role,
            stripe_customer_id: None,
            created_at: now,
        });
        let enrollment = Enrollment {
            id: new_id(),
            user_id: identity.user_id.clone(),
            course_id: course_id.to_string(),
            status: EnrollmentStatus::Active,
            amount: 49,
            created_at: now,
            updated_at: now,
        };
        data.enrollments.insert(enrollment.id.clone(), enrollment);
    }
}

/// The "intro-js" course: chapter A (L1, L2), chapter B (L3)
pub struct IntroJs {
    pub course_id: String,
    pub chapter_a: String,
    pub chapter_b: String,
    pub l1: String,
    pub l2: String,
    pub l3: String,
}

pub fn seed_intro_js(store: &MemoryStore) -> IntroJs {
    let course_id = store.insert_course_row("intro-js", "intro-cover.png", "price_intro");
    let chapter_a = store.seed_chapter(&course_id, "Basics", 1);
    let chapter_b = store.seed_chapter(&course_id, "Functions", 2);
    let l1 = store.seed_lesson(&chapter_a, "Variables", 1, Some("l1-video.mp4"));
    let l2 = store.seed_lesson(&chapter_a, "Operators", 2, None);
    let l3 = store.seed_lesson(&chapter_b, "Declarations", 1, Some("l3-video.mp4"));
    IntroJs {
        course_id,
        chapter_a,
        chapter_b,
        l1,
        l2,
        l3,
    }
}

#[async_trait]
impl CourseStore for MemoryStore {
    async fn insert_course(&self, course: &Course) -> ServiceResult<()> {
        self.writable()?;
        let mut data = self.data();
        if data.courses.values().any(|c| c.slug == course.slug) {
            return Err(AppError::new(ErrorCode::CourseSlugExists).into());
        }
        data.courses.insert(course.id.clone(), course.clone());
        Ok(())
    }

    async fn update_course(
        &self,
        course_id: &str,
        input: &CourseInput,
    ) -> ServiceResult<Option<(Course, Course)>> {
        self.writable()?;
        let mut data = self.data();
        if data
            .courses
            .values()
            .any(|c| c.slug == input.slug && c.id != course_id)
        {
            return Err(AppError::new(ErrorCode::CourseSlugExists).into());
        }
        let Some(course) = data.courses.get_mut(course_id) else {
            return Ok(None);
        };
        let before = course.clone();
        course.title = input.title.trim().to_string();
        course.slug = input.slug.clone();
        course.description = input.description.clone();
        course.small_description = input.small_description.trim().to_string();
        course.file_key = input.file_key.clone();
        course.price = input.price;
        course.duration = input.duration;
        course.level = input.level;
        course.category = input.category.clone();
        course.status = input.status;
        course.updated_at = now_millis();
        Ok(Some((before, course.clone())))
    }

    async fn delete_course(&self, course_id: &str) -> ServiceResult<Option<Vec<String>>> {
        self.writable()?;
        let mut data = self.data();
        let Some(course) = data.courses.remove(course_id) else {
            return Ok(None);
        };
        let mut keys = vec![course.file_key];
        for chapter in data.chapters_of(course_id) {
            if let Some(released) = data.remove_chapter(&chapter.id) {
                keys.extend(released);
            }
        }
        data.enrollments.retain(|_, e| e.course_id != course_id);
        Ok(Some(keys))
    }

    async fn find_course(&self, course_id: &str) -> ServiceResult<Option<Course>> {
        Ok(self.data().courses.get(course_id).cloned())
    }

    async fn find_course_by_slug(&self, slug: &str) -> ServiceResult<Option<Course>> {
        Ok(self.data().courses.values().find(|c| c.slug == slug).cloned())
    }

    async fn list_courses(&self, status: Option<CourseStatus>) -> ServiceResult<Vec<Course>> {
        let mut out: Vec<Course> = self
            .data()
            .courses
            .values()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}

#[async_trait]
impl StructureStore for MemoryStore {
    async fn course_outline(&self, course_id: &str) -> ServiceResult<Vec<ChapterOutline>> {
        let data = self.data();
        Ok(data
            .chapters_of(course_id)
            .into_iter()
            .map(|chapter| {
                let lessons = data.lessons_of(&chapter.id);
                ChapterOutline { chapter, lessons }
            })
            .collect())
    }

    async fn find_chapter(&self, chapter_id: &str) -> ServiceResult<Option<Chapter>> {
        Ok(self.data().chapters.get(chapter_id).cloned())
    }

    async fn find_lesson(&self, lesson_id: &str) -> ServiceResult<Option<Lesson>> {
        Ok(self.data().lessons.get(lesson_id).cloned())
    }

    async fn create_chapter(
        &self,
        course_id: &str,
        input: &ChapterInput,
    ) -> ServiceResult<Chapter> {
        self.writable()?;
        let mut data = self.data();
        if !data.courses.contains_key(course_id) {
            return Err(SiblingGroup::chapters(course_id).parent_not_found().into());
        }
        let now = now_millis();
        let chapter = Chapter {
            id: new_id(),
            course_id: course_id.to_string(),
            title: input.title.trim().to_string(),
            position: data.chapters_of(course_id).len() as i32 + 1,
            created_at: now,
            updated_at: now,
        };
        data.chapters.insert(chapter.id.clone(), chapter.clone());
        Ok(chapter)
    }

    async fn rename_chapter(
        &self,
        chapter_id: &str,
        title: &str,
    ) -> ServiceResult<Option<Chapter>> {
        self.writable()?;
        let mut data = self.data();
        Ok(data.chapters.get_mut(chapter_id).map(|c| {
            c.title = title.to_string();
            c.updated_at = now_millis();
            c.clone()
        }))
    }

    async fn delete_chapter(&self, chapter_id: &str) -> ServiceResult<Option<Vec<String>>> {
        self.writable()?;
        let mut data = self.data();
        let Some(course_id) = data.chapters.get(chapter_id).map(|c| c.course_id.clone()) else {
            return Ok(None);
        };
        let keys = data.remove_chapter(chapter_id);
        data.renumber_chapters(&course_id);
        Ok(keys)
    }

    async fn create_lesson(&self, chapter_id: &str, input: &LessonInput) -> ServiceResult<Lesson> {
        self.writable()?;
        let mut data = self.data();
        if !data.chapters.contains_key(chapter_id) {
            return Err(SiblingGroup::lessons(chapter_id).parent_not_found().into());
        }
        let now = now_millis();
        let lesson = Lesson {
            id: new_id(),
            chapter_id: chapter_id.to_string(),
            title: input.title.trim().to_string(),
            description: input.description.clone(),
            position: data.lessons_of(chapter_id).len() as i32 + 1,
            video_key: input.video_key.clone(),
            thumbnail_key: input.thumbnail_key.clone(),
            created_at: now,
            updated_at: now,
        };
        data.lessons.insert(lesson.id.clone(), lesson.clone());
        Ok(lesson)
    }

    async fn update_lesson(
        &self,
        lesson_id: &str,
        input: &LessonInput,
    ) -> ServiceResult<Option<(Lesson, Lesson)>> {
        self.writable()?;
        let mut data = self.data();
        let Some(lesson) = data.lessons.get_mut(lesson_id) else {
            return Ok(None);
        };
        let before = lesson.clone();
        lesson.title = input.title.trim().to_string();
        lesson.description = input.description.clone();
        lesson.video_key = input.video_key.clone();
        lesson.thumbnail_key = input.thumbnail_key.clone();
        lesson.updated_at = now_millis();
        Ok(Some((before, lesson.clone())))
    }

    async fn delete_lesson(&self, lesson_id: &str) -> ServiceResult<Option<Lesson>> {
        self.writable()?;
        let mut data = self.data();
        let Some(lesson) = data.remove_lesson(lesson_id) else {
            return Ok(None);
        };
        data.renumber_lessons(&lesson.chapter_id);
        Ok(Some(lesson))
    }

    async fn clear_asset_references(&self, key: &str) -> ServiceResult<u64> {
        self.writable()?;
        let mut touched = 0;
        for lesson in self.data().lessons.values_mut() {
            let mut hit = false;
            if lesson.video_key.as_deref() == Some(key) {
                lesson.video_key = None;
                hit = true;
            }
            if lesson.thumbnail_key.as_deref() == Some(key) {
                lesson.thumbnail_key = None;
                hit = true;
            }
            if hit {
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[async_trait]
impl PositionLedger for MemoryStore {
    async fn group_members(&self, group: &SiblingGroup) -> ServiceResult<Vec<String>> {
        self.data()
            .members(group)
            .ok_or_else(|| group.parent_not_found().into())
    }

    async fn set_positions(
        &self,
        group: &SiblingGroup,
        assignments: &[PositionAssignment],
    ) -> ServiceResult<()> {
        let mut data = self.data();
        let members = data.members(group).ok_or_else(|| group.parent_not_found())?;
        validate_assignments(group, &members, assignments)?;
        self.writable()?;
        for a in assignments {
            match group {
                SiblingGroup::Chapters { .. } => {
                    if let Some(c) = data.chapters.get_mut(&a.item_id) {
                        c.position = a.position;
                    }
                }
                SiblingGroup::Lessons { .. } => {
                    if let Some(l) = data.lessons.get_mut(&a.item_id) {
                        l.position = a.position;
                    }
                }
            }
        }
        Ok(())
    }
}

struct MemoryCheckout {
    data: Arc<Mutex<Data>>,
    fail_commit: Arc<AtomicBool>,
    prior: Option<Enrollment>,
    staged: Enrollment,
}

impl MemoryCheckout {
    fn discard(self) {
        let mut data = self.data.lock().unwrap();
        match self.prior {
            Some(prior) => {
                data.enrollments.insert(prior.id.clone(), prior);
            }
            None => {
                data.enrollments.remove(&self.staged.id);
            }
        }
    }
}

#[async_trait]
impl PendingCheckout for MemoryCheckout {
    fn enrollment(&self) -> &Enrollment {
        &self.staged
    }

    async fn commit(self: Box<Self>) -> ServiceResult<()> {
        if self.fail_commit.load(Ordering::SeqCst) {
            (*self).discard();
            return Err(ServiceError::Db("commit failed: connection reset by peer".into()));
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> ServiceResult<()> {
        (*self).discard();
        Ok(())
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn find_enrollment(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> ServiceResult<Option<Enrollment>> {
        Ok(self.data().enrollment_of(user_id, course_id).cloned())
    }

    async fn begin_checkout(
        &self,
        user_id: &str,
        course_id: &str,
        amount: i64,
    ) -> ServiceResult<Box<dyn PendingCheckout>> {
        self.writable()?;
        let mut data = self.data();
        let now = now_millis();
        let prior = data.enrollment_of(user_id, course_id).cloned();
        let staged = match &prior {
            Some(existing) if !existing.status.can_checkout() => existing.clone(),
            Some(existing) => Enrollment {
                status: EnrollmentStatus::Pending,
                amount,
                updated_at: now,
                ..existing.clone()
            },
            None => Enrollment {
                id: new_id(),
                user_id: user_id.to_string(),
                course_id: course_id.to_string(),
                status: EnrollmentStatus::Pending,
                amount,
                created_at: now,
                updated_at: now,
            },
        };
        data.enrollments.insert(staged.id.clone(), staged.clone());
        Ok(Box::new(MemoryCheckout {
            data: self.data.clone(),
            fail_commit: self.fail_commits.clone(),
            prior,
            staged,
        }))
    }

    async fn activate_enrollment(&self, enrollment_id: &str) -> ServiceResult<bool> {
        self.writable()?;
        let mut data = self.data();
        match data.enrollments.get_mut(enrollment_id) {
            Some(e) if e.status != EnrollmentStatus::Active => {
                e.status = EnrollmentStatus::Active;
                e.updated_at = now_millis();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn activate_for(
        &self,
        user_id: &str,
        course_id: &str,
        amount: i64,
    ) -> ServiceResult<bool> {
        self.writable()?;
        let mut data = self.data();
        let existing = data.enrollment_of(user_id, course_id).cloned();
        let now = now_millis();
        let enrollment = match existing {
            Some(e) if e.status == EnrollmentStatus::Active => return Ok(false),
            Some(e) => Enrollment {
                status: EnrollmentStatus::Active,
                updated_at: now,
                ..e
            },
            None => Enrollment {
                id: new_id(),
                user_id: user_id.to_string(),
                course_id: course_id.to_string(),
                status: EnrollmentStatus::Active,
                amount,
                created_at: now,
                updated_at: now,
            },
        };
        data.enrollments.insert(enrollment.id.clone(), enrollment);
        Ok(true)
    }

    async fn cancel_pending(&self, enrollment_id: &str) -> ServiceResult<bool> {
        self.writable()?;
        let mut data = self.data();
        match data.enrollments.get_mut(enrollment_id) {
            Some(e) if e.status == EnrollmentStatus::Pending => {
                e.status = EnrollmentStatus::Cancelled;
                e.updated_at = now_millis();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_active_courses(&self, user_id: &str) -> ServiceResult<Vec<Course>> {
        let data = self.data();
        let mut active: Vec<&Enrollment> = data
            .enrollments
            .values()
            .filter(|e| e.user_id == user_id && e.status == EnrollmentStatus::Active)
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active
            .into_iter()
            .filter_map(|e| data.courses.get(&e.course_id).cloned())
            .collect())
    }

    async fn enrollment_counts_since(&self, since: i64) -> ServiceResult<Vec<EnrollmentDayCount>> {
        let data = self.data();
        let mut by_day: HashMap<i64, i64> = HashMap::new();
        for e in data.enrollments.values().filter(|e| e.created_at >= since) {
            *by_day.entry(day_start_millis(e.created_at)).or_default() += 1;
        }
        let mut out: Vec<EnrollmentDayCount> = by_day
            .into_iter()
            .map(|(day, count)| EnrollmentDayCount { day, count })
            .collect();
        out.sort_by_key(|d| d.day);
        Ok(out)
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn find_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> ServiceResult<Option<LessonProgress>> {
        Ok(self
            .data()
            .progress
            .get(&(user_id.to_string(), lesson_id.to_string()))
            .cloned())
    }

    async fn upsert_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
        completed: bool,
    ) -> ServiceResult<LessonProgress> {
        self.writable()?;
        let now = now_millis();
        let mut data = self.data();
        let row = data
            .progress
            .entry((user_id.to_string(), lesson_id.to_string()))
            .or_insert_with(|| LessonProgress {
                id: new_id(),
                user_id: user_id.to_string(),
                lesson_id: lesson_id.to_string(),
                completed,
                created_at: now,
                updated_at: now,
            });
        row.completed = completed;
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn count_course_progress(
        &self,
        course_id: &str,
        user_id: &str,
    ) -> ServiceResult<(i64, i64)> {
        let data = self.data();
        let lesson_ids: Vec<String> = data
            .chapters_of(course_id)
            .iter()
            .flat_map(|c| data.lessons_of(&c.id))
            .map(|l| l.id)
            .collect();
        let completed = lesson_ids
            .iter()
            .filter(|id| {
                data.progress
                    .get(&(user_id.to_string(), (*id).clone()))
                    .is_some_and(|p| p.completed)
            })
            .count();
        Ok((lesson_ids.len() as i64, completed as i64))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn ensure_user(&self, identity: &UserIdentity) -> ServiceResult<User> {
        let mut data = self.data();
        if let Some(user) = data.users.get(&identity.user_id)
            && user.email == identity.email
            && user.name == identity.name
            && user.role == identity.role
        {
            return Ok(user.clone());
        }

        self.writable()?;
        let now = now_millis();
        let user = data
            .users
            .entry(identity.user_id.clone())
            .or_insert_with(|| User {
                id: identity.user_id.clone(),
                email: identity.email.clone(),
                name: identity.name.clone(),
                role: identity.role,
                stripe_customer_id: None,
                created_at: now,
            });
        user.email = identity.email.clone();
        user.name = identity.name.clone();
        user.role = identity.role;
        Ok(user.clone())
    }

    async fn set_stripe_customer(&self, user_id: &str, customer_id: &str) -> ServiceResult<()> {
        self.writable()?;
        if let Some(user) = self.data().users.get_mut(user_id) {
            user.stripe_customer_id = Some(customer_id.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookEvents for MemoryStore {
    async fn mark_event(&self, event_id: &str, _event_type: &str) -> ServiceResult<bool> {
        self.writable()?;
        Ok(self.data().events.insert(event_id.to_string()))
    }

    async fn forget_event(&self, event_id: &str) -> ServiceResult<()> {
        self.data().events.remove(event_id);
        Ok(())
    }
}

// ── Provider fakes ──

#[derive(Default)]
struct PaymentLog {
    customers: Vec<String>,
    sessions: Vec<CheckoutSessionRequest>,
    products: Vec<ProductRequest>,
    archived: Vec<String>,
}

/// Records every provider call; each call kind can be made to fail
#[derive(Default)]
pub struct FakePayments {
    log: Mutex<PaymentLog>,
    fail_customers: AtomicBool,
    fail_sessions: AtomicBool,
    fail_archive: AtomicBool,
}

impl FakePayments {
    pub fn fail_customers(&self, fail: bool) {
        self.fail_customers.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sessions(&self, fail: bool) {
        self.fail_sessions.store(fail, Ordering::SeqCst);
    }

    pub fn fail_archive(&self, fail: bool) {
        self.fail_archive.store(fail, Ordering::SeqCst);
    }

    /// Idempotency keys of created customers
    pub fn customers(&self) -> Vec<String> {
        self.log.lock().unwrap().customers.clone()
    }

    pub fn sessions(&self) -> Vec<CheckoutSessionRequest> {
        self.log.lock().unwrap().sessions.clone()
    }

    pub fn products(&self) -> Vec<ProductRequest> {
        self.log.lock().unwrap().products.clone()
    }

    pub fn archived(&self) -> Vec<String> {
        self.log.lock().unwrap().archived.clone()
    }
}

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn create_customer(
        &self,
        _email: &str,
        _name: &str,
        user_id: &str,
        idempotency_key: &str,
    ) -> Result<String, BoxError> {
        if self.fail_customers.load(Ordering::SeqCst) {
            return Err("stripe customers failed: api unavailable".into());
        }
        self.log
            .lock()
            .unwrap()
            .customers
            .push(idempotency_key.to_string());
        Ok(format!("cus_{user_id}"))
    }

    async fn create_checkout_session(
        &self,
        req: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, BoxError> {
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err("stripe checkout/sessions failed: card network down".into());
        }
        let mut log = self.log.lock().unwrap();
        log.sessions.push(req.clone());
        let id = format!("cs_{}", log.sessions.len());
        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.test/{id}"),
            id,
        })
    }

    async fn create_product(&self, req: &ProductRequest) -> Result<String, BoxError> {
        let mut log = self.log.lock().unwrap();
        log.products.push(req.clone());
        Ok(format!("price_{}", log.products.len()))
    }

    async fn archive_product(&self, price_id: &str) -> Result<(), BoxError> {
        if self.fail_archive.load(Ordering::SeqCst) {
            return Err("stripe products failed: no such product".into());
        }
        self.log.lock().unwrap().archived.push(price_id.to_string());
        Ok(())
    }
}

/// Object store that remembers deletions
#[derive(Default)]
pub struct FakeObjects {
    deleted: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    presigned: AtomicUsize,
    fail_deletes: AtomicBool,
}

impl FakeObjects {
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn presigned(&self) -> usize {
        self.presigned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FakeObjects {
    async fn presign_put(
        &self,
        key: &str,
        _content_type: &str,
        _size: i64,
    ) -> Result<String, BoxError> {
        self.presigned.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://academy.t3.storage.dev/{key}?X-Amz-Expires=360&X-Amz-Signature=test"
        ))
    }

    async fn delete_object(&self, key: &str) -> Result<(), BoxError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(format!("delete {key}: access denied").into());
        }
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        public_object_url("academy", "t3.storage.dev", key)
    }
}

/// Shield with a fixed answer
pub struct FakeShield {
    decision: Mutex<Decision>,
}

impl Default for FakeShield {
    fn default() -> Self {
        Self {
            decision: Mutex::new(Decision::Allowed),
        }
    }
}

impl FakeShield {
    pub fn set(&self, decision: Decision) {
        *self.decision.lock().unwrap() = decision;
    }
}

#[async_trait]
impl Shield for FakeShield {
    async fn protect(&self, _rule: ShieldRule, _fingerprint: &str, _client: &ClientInfo) -> Decision {
        *self.decision.lock().unwrap()
    }
}

// ── Assembled state ──

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test";

/// `AppState` over the fakes, with handles to inspect them
pub struct TestState {
    pub app: AppState,
    pub store: Arc<MemoryStore>,
    pub payments: Arc<FakePayments>,
    pub objects: Arc<FakeObjects>,
    pub shield: Arc<FakeShield>,
    pub client: ClientInfo,
}

impl TestState {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let payments = Arc::new(FakePayments::default());
        let objects = Arc::new(FakeObjects::default());
        let shield = Arc::new(FakeShield::default());

        let app = AppState {
            store: store.clone(),
            payments: payments.clone(),
            objects: objects.clone(),
            shield: shield.clone(),
            rate_limiter: RateLimiter::new(),
            janitor: AssetJanitor::inline(objects.clone()),
            jwt_secret: TEST_JWT_SECRET.into(),
            stripe_webhook_secret: TEST_WEBHOOK_SECRET.into(),
            stripe_currency: "usd".into(),
            payment_success_url: "http://localhost:3000/payment/success".into(),
            payment_cancel_url: "http://localhost:3000/payment/cancel".into(),
        };

        Self {
            app,
            store,
            payments,
            objects,
            shield,
            client: ClientInfo::browser("10.0.0.1"),
        }
    }
}
