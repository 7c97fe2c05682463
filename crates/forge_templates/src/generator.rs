//! Deterministic Terraform generation for an ECS Fargate deployment shape.
//! No reasoning-service call is needed here — the shape of the stack is
//! fixed, only the application-specific values vary.

use std::collections::HashMap;

use forge_scm::RepositoryContext;

/// Where Terraform state for this stack is stored. Kept out of the
/// generated files themselves so the same stack can be regenerated
/// against a different backend without touching application resources.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub state_bucket: String,
    pub region: String,
    pub lock_table: String,
}

fn slug(name: &str) -> String {
    name.to_lowercase().replace(['_', ' '], "-")
}

/// Generates the full set of `.tf` files for an ECS Fargate stack.
pub fn generate_fargate_stack(context: &RepositoryContext, project_id: &str, repo_name: &str, backend: &BackendConfig) -> HashMap<String, String> {
    let app_port = context.ports.first().copied().unwrap_or(3000);
    let health_path = context.health_check_path.clone().unwrap_or_else(|| "/health".to_string());
    let app_name = slug(repo_name);

    let mut files = HashMap::new();
    files.insert("main.tf".to_string(), main_tf(&app_name, app_port, &health_path));
    files.insert("variables.tf".to_string(), variables_tf(&app_name, repo_name));
    files.insert("outputs.tf".to_string(), outputs_tf());
    files.insert("iam.tf".to_string(), iam_tf());
    files.insert("security_groups.tf".to_string(), security_groups_tf(app_port));
    files.insert("data.tf".to_string(), data_tf());
    files.insert("backend.tf".to_string(), backend_tf(project_id, backend));
    files.insert("STATE.md".to_string(), state_md(project_id, backend));
    files
}

fn main_tf(app_name: &str, app_port: u16, health_path: &str) -> String {
    format!(
        r#"terraform {{
  required_version = ">= 1.5.0"
  required_providers {{
    aws = {{
      source  = "hashicorp/aws"
      version = "~> 5.0"
    }}
  }}
}}

provider "aws" {{
  region = var.region
}}

resource "aws_vpc" "main" {{
  cidr_block           = var.vpc_cidr
  enable_dns_hostnames = true
  enable_dns_support   = true
  tags = {{
    Name        = "${{var.app_name}}-vpc"
    Environment = var.environment
  }}
}}

resource "aws_subnet" "public" {{
  count                   = 2
  vpc_id                  = aws_vpc.main.id
  cidr_block              = var.public_subnet_cidrs[count.index]
  availability_zone       = data.aws_availability_zones.available.names[count.index]
  map_public_ip_on_launch = true
  tags = {{
    Name        = "${{var.app_name}}-public-${{count.index + 1}}"
    Environment = var.environment
  }}
}}

resource "aws_subnet" "private" {{
  count             = 2
  vpc_id            = aws_vpc.main.id
  cidr_block        = var.private_subnet_cidrs[count.index]
  availability_zone = data.aws_availability_zones.available.names[count.index]
  tags = {{
    Name        = "${{var.app_name}}-private-${{count.index + 1}}"
    Environment = var.environment
  }}
}}

resource "aws_internet_gateway" "main" {{
  vpc_id = aws_vpc.main.id
  tags = {{
    Name        = "${{var.app_name}}-igw"
    Environment = var.environment
  }}
}}

resource "aws_eip" "nat" {{
  domain = "vpc"
  tags = {{
    Name        = "${{var.app_name}}-nat-eip"
    Environment = var.environment
  }}
}}

resource "aws_nat_gateway" "main" {{
  allocation_id = aws_eip.nat.id
  subnet_id     = aws_subnet.public[0].id
  tags = {{
    Name        = "${{var.app_name}}-nat"
    Environment = var.environment
  }}
  depends_on = [aws_internet_gateway.main]
}}

resource "aws_route_table" "public" {{
  vpc_id = aws_vpc.main.id
  route {{
    cidr_block = "0.0.0.0/0"
    gateway_id = aws_internet_gateway.main.id
  }}
  tags = {{
    Name        = "${{var.app_name}}-public-rt"
    Environment = var.environment
  }}
}}

resource "aws_route_table" "private" {{
  vpc_id = aws_vpc.main.id
  route {{
    cidr_block     = "0.0.0.0/0"
    nat_gateway_id = aws_nat_gateway.main.id
  }}
  tags = {{
    Name        = "${{var.app_name}}-private-rt"
    Environment = var.environment
  }}
}}

resource "aws_route_table_association" "public" {{
  count          = 2
  subnet_id      = aws_subnet.public[count.index].id
  route_table_id = aws_route_table.public.id
}}

resource "aws_route_table_association" "private" {{
  count          = 2
  subnet_id      = aws_subnet.private[count.index].id
  route_table_id = aws_route_table.private.id
}}

data "aws_ecr_repository" "main" {{
  name = var.ecr_repository_name
}}

resource "aws_cloudwatch_log_group" "main" {{
  name              = "/ecs/${{var.app_name}}"
  retention_in_days = 7
  tags = {{
    Name        = "${{var.app_name}}-logs"
    Environment = var.environment
  }}
}}

resource "aws_ecs_cluster" "main" {{
  name = "${{var.app_name}}-cluster"
  setting {{
    name  = "containerInsights"
    value = "enabled"
  }}
  tags = {{
    Name        = "${{var.app_name}}-cluster"
    Environment = var.environment
  }}
}}

resource "aws_ecs_task_definition" "app" {{
  family                   = "${{var.app_name}}-task"
  network_mode             = "awsvpc"
  requires_compatibilities = ["FARGATE"]
  cpu                      = var.container_cpu
  memory                   = var.container_memory
  execution_role_arn       = aws_iam_role.ecs_execution_role.arn
  task_role_arn            = aws_iam_role.ecs_task_role.arn

  container_definitions = jsonencode([
    {{
      name  = var.app_name
      image = "${{data.aws_ecr_repository.main.repository_url}}:latest"
      portMappings = [
        {{
          containerPort = {app_port}
          hostPort      = {app_port}
          protocol      = "tcp"
        }}
      ]
      logConfiguration = {{
        logDriver = "awslogs"
        options = {{
          "awslogs-group"         = aws_cloudwatch_log_group.main.name
          "awslogs-region"        = var.region
          "awslogs-stream-prefix" = "ecs"
        }}
      }}
      healthCheck = {{
        command     = ["CMD-SHELL", "wget --no-verbose --tries=1 --spider http://localhost:{app_port}{health_path} || exit 1"]
        interval    = 30
        timeout     = 5
        retries     = 3
        startPeriod = 60
      }}
    }}
  ])
  tags = {{
    Name        = "${{var.app_name}}-task"
    Environment = var.environment
  }}
}}

resource "aws_ecs_service" "main" {{
  name            = "${{var.app_name}}-service"
  cluster         = aws_ecs_cluster.main.id
  task_definition = aws_ecs_task_definition.app.arn
  launch_type     = "FARGATE"
  desired_count   = var.desired_count

  network_configuration {{
    subnets          = aws_subnet.private[*].id
    security_groups  = [aws_security_group.ecs_tasks.id]
    assign_public_ip = false
  }}

  load_balancer {{
    target_group_arn = aws_lb_target_group.app.arn
    container_name   = var.app_name
    container_port   = {app_port}
  }}

  deployment_circuit_breaker {{
    enable   = true
    rollback = true
  }}

  tags = {{
    Name        = "${{var.app_name}}-service"
    Environment = var.environment
  }}

  depends_on = [aws_lb_listener.http]
}}

resource "aws_lb" "main" {{
  name                       = "${{var.app_name}}-alb"
  internal                   = false
  load_balancer_type         = "application"
  security_groups            = [aws_security_group.alb.id]
  subnets                    = aws_subnet.public[*].id
  enable_deletion_protection = false
  tags = {{
    Name        = "${{var.app_name}}-alb"
    Environment = var.environment
  }}
}}

resource "aws_lb_target_group" "app" {{
  name        = "${{var.app_name}}-tg"
  port        = {app_port}
  protocol    = "HTTP"
  vpc_id      = aws_vpc.main.id
  target_type = "ip"

  health_check {{
    enabled             = true
    interval            = 30
    path                = "{health_path}"
    port                = "traffic-port"
    healthy_threshold   = 2
    unhealthy_threshold = 3
    timeout             = 5
    protocol            = "HTTP"
    matcher             = "200-299"
  }}

  deregistration_delay = 30

  tags = {{
    Name        = "${{var.app_name}}-tg"
    Environment = var.environment
  }}
}}

resource "aws_lb_listener" "https" {{
  count             = var.enable_https ? 1 : 0
  load_balancer_arn = aws_lb.main.arn
  port              = "443"
  protocol          = "HTTPS"
  ssl_policy        = "ELBSecurityPolicy-TLS-1-2-2017-01"
  certificate_arn   = var.acm_certificate_arn

  default_action {{
    type             = "forward"
    target_group_arn = aws_lb_target_group.app.arn
  }}
}}

resource "aws_lb_listener" "http" {{
  load_balancer_arn = aws_lb.main.arn
  port              = "80"
  protocol          = "HTTP"

  default_action {{
    type = var.enable_https ? "redirect" : "forward"

    dynamic "redirect" {{
      for_each = var.enable_https ? [1] : []
      content {{
        port        = "443"
        protocol    = "HTTPS"
        status_code = "HTTP_301"
      }}
    }}

    target_group_arn = var.enable_https ? null : aws_lb_target_group.app.arn
  }}
}}
"#,
    )
}

fn variables_tf(app_name: &str, repo_name: &str) -> String {
    format!(
        r#"variable "region" {{
  description = "AWS region for resources"
  type        = string
  default     = "us-west-2"
}}

variable "app_name" {{
  description = "Application name (used for resource naming)"
  type        = string
  default     = "{app_name}"
}}

variable "ecr_repository_name" {{
  description = "ECR repository name"
  type        = string
  default     = "{repo_name}"
}}

variable "environment" {{
  description = "Environment (dev, staging, prod)"
  type        = string
  default     = "production"
}}

variable "vpc_cidr" {{
  description = "CIDR block for VPC"
  type        = string
  default     = "10.0.0.0/16"
}}

variable "public_subnet_cidrs" {{
  description = "CIDR blocks for public subnets"
  type        = list(string)
  default     = ["10.0.1.0/24", "10.0.2.0/24"]
}}

variable "private_subnet_cidrs" {{
  description = "CIDR blocks for private subnets"
  type        = list(string)
  default     = ["10.0.11.0/24", "10.0.12.0/24"]
}}

variable "container_cpu" {{
  description = "CPU units for container (256 = 0.25 vCPU)"
  type        = number
  default     = 256
}}

variable "container_memory" {{
  description = "Memory for container in MB"
  type        = number
  default     = 512
}}

variable "desired_count" {{
  description = "Desired number of ECS tasks"
  type        = number
  default     = 2
}}

variable "acm_certificate_arn" {{
  description = "ARN of ACM certificate for HTTPS listener"
  type        = string
  default     = ""
}}

variable "enable_https" {{
  description = "Enable HTTPS listener (requires a valid ACM certificate)"
  type        = bool
  default     = false
}}
"#,
    )
}

fn outputs_tf() -> String {
    r#"output "alb_dns_name" {
  description = "ALB DNS name - use this to access your application"
  value       = aws_lb.main.dns_name
}

output "ecr_repository_url" {
  description = "ECR repository URL - Docker image location"
  value       = data.aws_ecr_repository.main.repository_url
}

output "ecs_cluster_name" {
  description = "ECS cluster name"
  value       = aws_ecs_cluster.main.name
}

output "ecs_service_name" {
  description = "ECS service name"
  value       = aws_ecs_service.main.name
}

output "cloudwatch_log_group" {
  description = "CloudWatch log group for application logs"
  value       = aws_cloudwatch_log_group.main.name
}
"#
    .to_string()
}

fn iam_tf() -> String {
    r#"resource "aws_iam_role" "ecs_execution_role" {
  name = "${var.app_name}-ecs-execution-role"
  assume_role_policy = jsonencode({
    Version = "2012-10-17"
    Statement = [{
      Action = "sts:AssumeRole"
      Effect = "Allow"
      Principal = {
        Service = "ecs-tasks.amazonaws.com"
      }
    }]
  })
  tags = {
    Name        = "${var.app_name}-ecs-execution-role"
    Environment = var.environment
  }
}

resource "aws_iam_role_policy_attachment" "ecs_execution_role_policy" {
  role       = aws_iam_role.ecs_execution_role.name
  policy_arn = "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy"
}

resource "aws_iam_role" "ecs_task_role" {
  name = "${var.app_name}-ecs-task-role"
  assume_role_policy = jsonencode({
    Version = "2012-10-17"
    Statement = [{
      Action = "sts:AssumeRole"
      Effect = "Allow"
      Principal = {
        Service = "ecs-tasks.amazonaws.com"
      }
    }]
  })
  tags = {
    Name        = "${var.app_name}-ecs-task-role"
    Environment = var.environment
  }
}
"#
    .to_string()
}

fn security_groups_tf(app_port: u16) -> String {
    format!(
        r#"resource "aws_security_group" "alb" {{
  name        = "${{var.app_name}}-alb-sg"
  description = "Security group for Application Load Balancer"
  vpc_id      = aws_vpc.main.id

  ingress {{
    description = "HTTP from internet"
    from_port   = 80
    to_port     = 80
    protocol    = "tcp"
    cidr_blocks = ["0.0.0.0/0"]
  }}

  ingress {{
    description = "HTTPS from internet"
    from_port   = 443
    to_port     = 443
    protocol    = "tcp"
    cidr_blocks = ["0.0.0.0/0"]
  }}

  egress {{
    description = "Allow all outbound"
    from_port   = 0
    to_port     = 0
    protocol    = "-1"
    cidr_blocks = ["0.0.0.0/0"]
  }}

  tags = {{
    Name        = "${{var.app_name}}-alb-sg"
    Environment = var.environment
  }}
}}

resource "aws_security_group" "ecs_tasks" {{
  name        = "${{var.app_name}}-ecs-tasks-sg"
  description = "Security group for ECS tasks"
  vpc_id      = aws_vpc.main.id

  ingress {{
    description     = "Allow traffic from ALB"
    from_port       = {app_port}
    to_port         = {app_port}
    protocol        = "tcp"
    security_groups = [aws_security_group.alb.id]
  }}

  egress {{
    description = "Allow all outbound (for pulling images, etc.)"
    from_port   = 0
    to_port     = 0
    protocol    = "-1"
    cidr_blocks = ["0.0.0.0/0"]
  }}

  tags = {{
    Name        = "${{var.app_name}}-ecs-tasks-sg"
    Environment = var.environment
  }}
}}
"#,
    )
}

fn data_tf() -> String {
    r#"data "aws_availability_zones" "available" {
  state = "available"
}

data "aws_caller_identity" "current" {}
"#
    .to_string()
}

fn backend_tf(project_id: &str, backend: &BackendConfig) -> String {
    format!(
        r#"terraform {{
  backend "s3" {{
    bucket         = "{bucket}"
    key            = "states/{project_id}/terraform.tfstate"
    region         = "{region}"
    dynamodb_table = "{lock_table}"
    encrypt        = true
  }}
}}
"#,
        bucket = backend.state_bucket,
        region = backend.region,
        lock_table = backend.lock_table,
    )
}

/// Short companion doc describing where this stack's state lives.
/// `terraform init` itself runs inside the sandbox, not the caller's
/// shell, so this is documentation rather than an operational script.
fn state_md(project_id: &str, backend: &BackendConfig) -> String {
    format!(
        "# Terraform state\n\n\
         This stack's state lives at `states/{project_id}/terraform.tfstate`\n\
         in bucket `{bucket}` ({region}), locked via DynamoDB table `{lock_table}`.\n\
         `terraform init` runs inside the deployment sandbox against this backend;\n\
         there is nothing to run locally.\n",
        bucket = backend.state_bucket,
        region = backend.region,
        lock_table = backend.lock_table,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn backend() -> BackendConfig {
        BackendConfig { state_bucket: "forge-state".into(), region: "us-west-2".into(), lock_table: "forge-locks".into() }
    }

    #[test]
    fn generates_all_required_files() {
        let context = RepositoryContext { ports: vec![8080], health_check_path: Some("/healthz".into()), ..Default::default() };
        let files = generate_fargate_stack(&context, "proj-1", "acme/widgets", &backend());
        for name in ["main.tf", "variables.tf", "outputs.tf", "iam.tf", "security_groups.tf", "data.tf", "backend.tf", "STATE.md"] {
            assert!(files.contains_key(name), "missing {name}");
        }
    }

    #[test]
    fn app_port_and_health_path_are_interpolated() {
        let context = RepositoryContext { ports: vec![9090], health_check_path: Some("/ready".into()), ..Default::default() };
        let files = generate_fargate_stack(&context, "proj-1", "acme/widgets", &backend());
        assert!(files["main.tf"].contains("containerPort = 9090"));
        assert!(files["main.tf"].contains("/ready"));
    }

    #[test]
    fn missing_ports_falls_back_to_3000() {
        let context = RepositoryContext::default();
        let files = generate_fargate_stack(&context, "proj-1", "acme/widgets", &backend());
        assert!(files["main.tf"].contains("containerPort = 3000"));
    }

    #[test]
    fn repo_name_is_slugified_for_app_name() {
        let context = RepositoryContext::default();
        let files = generate_fargate_stack(&context, "proj-1", "Acme_Widgets", &backend());
        assert!(files["variables.tf"].contains(r#"default     = "acme-widgets""#));
        let _: StdHashMap<String, String> = files;
    }
}
